use crate::context::NamingContext;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::fmt::Write;
use thiserror::Error;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Upper bound for a padding width; a file name component cannot be longer.
const MAX_WIDTH: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    Counter,
    Orig,
    Ext,
    Date,
    Mtime,
    Prefix,
    Suffix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Text,
    DateTime,
}

impl Placeholder {
    pub const ALL: [Placeholder; 7] = [
        Placeholder::Counter,
        Placeholder::Orig,
        Placeholder::Ext,
        Placeholder::Date,
        Placeholder::Mtime,
        Placeholder::Prefix,
        Placeholder::Suffix,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Placeholder::Counter => "counter",
            Placeholder::Orig => "orig",
            Placeholder::Ext => "ext",
            Placeholder::Date => "date",
            Placeholder::Mtime => "mtime",
            Placeholder::Prefix => "prefix",
            Placeholder::Suffix => "suffix",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Placeholder::Counter => ValueKind::Integer,
            Placeholder::Orig | Placeholder::Ext | Placeholder::Prefix | Placeholder::Suffix => {
                ValueKind::Text
            }
            Placeholder::Date | Placeholder::Mtime => ValueKind::DateTime,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("テンプレートが空です")]
    Empty,
    #[error("中括弧の対応が不正です: {pattern}")]
    UnbalancedBraces { pattern: String },
    #[error("名前のないプレースホルダーがあります: {pattern}")]
    EmptyPlaceholder { pattern: String },
    #[error("未対応のプレースホルダーです: {{{name}}} (pattern={pattern})")]
    UnknownPlaceholder { name: String, pattern: String },
    #[error("{{{placeholder}}} の書式指定 '{spec}' が不正です: {reason} (pattern={pattern})")]
    InvalidFormat {
        placeholder: String,
        spec: String,
        reason: String,
        pattern: String,
    },
    #[error("連番が上限を超えます: 開始値 {start} から {files} 件")]
    CounterOverflow { start: i64, files: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
    AfterSign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sign {
    Minus,
    Plus,
    Space,
}

/// `[[fill]align][sign][0][width][type]`, the subset of the conventional
/// format mini-language that makes sense for file names.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PadSpec {
    fill: Option<char>,
    align: Option<Align>,
    sign: Sign,
    zero: bool,
    width: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldFormat {
    Integer(PadSpec),
    Text(PadSpec),
    DateTime(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    placeholder: Placeholder,
    spec: Option<String>,
    format: FieldFormat,
}

impl Field {
    pub fn placeholder(&self) -> Placeholder {
        self.placeholder
    }

    pub fn spec(&self) -> Option<&str> {
        self.spec.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplatePart {
    Literal(String),
    Field(Field),
}

/// A parsed naming pattern. Every placeholder and format spec has been
/// checked, so rendering only depends on the context values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pattern: String,
    parts: Vec<TemplatePart>,
}

impl Template {
    pub fn parse(pattern: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            pattern: pattern.to_string(),
            parts: parse_template(pattern)?,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Rewrites every bare `{counter}` to `{counter:0<digits>d}`. Counters
    /// that already carry a spec are left alone.
    pub fn with_counter_padding(mut self, digits: Option<usize>) -> Result<Self, TemplateError> {
        let Some(digits) = digits.filter(|d| *d > 0) else {
            return Ok(self);
        };
        let spec = format!("0{}d", digits);
        for part in &mut self.parts {
            if let TemplatePart::Field(field) = part {
                if field.placeholder == Placeholder::Counter && field.spec.is_none() {
                    field.format =
                        compile_format(Placeholder::Counter, Some(&spec), &self.pattern)?;
                    field.spec = Some(spec.clone());
                }
            }
        }
        Ok(self)
    }

    pub fn references(&self, placeholder: Placeholder) -> bool {
        self.parts.iter().any(|part| {
            matches!(part, TemplatePart::Field(field) if field.placeholder == placeholder)
        })
    }

    pub fn render(&self, context: &NamingContext) -> Result<String, TemplateError> {
        let mut output = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Literal(s) => output.push_str(s),
                TemplatePart::Field(field) => self.render_field(field, context, &mut output)?,
            }
        }
        Ok(output)
    }

    fn render_field(
        &self,
        field: &Field,
        context: &NamingContext,
        output: &mut String,
    ) -> Result<(), TemplateError> {
        match &field.format {
            FieldFormat::Integer(spec) => {
                output.push_str(&format_integer(context.counter, spec));
            }
            FieldFormat::Text(spec) => {
                let value = match field.placeholder {
                    Placeholder::Orig => &context.orig,
                    Placeholder::Ext => &context.ext,
                    Placeholder::Prefix => &context.prefix,
                    _ => &context.suffix,
                };
                output.push_str(&format_text(value, spec));
            }
            FieldFormat::DateTime(fmt) => {
                let value = if field.placeholder == Placeholder::Mtime {
                    &context.mtime
                } else {
                    &context.date
                };
                write_date(output, value, fmt).map_err(|_| TemplateError::InvalidFormat {
                    placeholder: field.placeholder.name().to_string(),
                    spec: fmt.clone(),
                    reason: "日時を書式化できませんでした".to_string(),
                    pattern: self.pattern.clone(),
                })?;
            }
        }
        Ok(())
    }
}

pub fn validate_template(pattern: &str) -> Result<(), TemplateError> {
    parse_template(pattern).map(|_| ())
}

/// Parses, pads and renders `pattern` in one go.
pub fn expand(
    pattern: &str,
    context: &NamingContext,
    zero_pad_digits: Option<usize>,
) -> Result<String, TemplateError> {
    Template::parse(pattern)?
        .with_counter_padding(zero_pad_digits)?
        .render(context)
}

pub fn parse_template(input: &str) -> Result<Vec<TemplatePart>, TemplateError> {
    if input.is_empty() {
        return Err(TemplateError::Empty);
    }
    let unbalanced = || TemplateError::UnbalancedBraces {
        pattern: input.to_string(),
    };

    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                if !literal.is_empty() {
                    parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                }
                let mut token = String::new();
                let mut found_close = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        found_close = true;
                        break;
                    }
                    if next == '{' {
                        return Err(unbalanced());
                    }
                    token.push(next);
                }
                if !found_close {
                    return Err(unbalanced());
                }
                parts.push(TemplatePart::Field(parse_field(&token, input)?));
            }
            '}' => return Err(unbalanced()),
            _ => literal.push(ch),
        }
    }

    if !literal.is_empty() {
        parts.push(TemplatePart::Literal(literal));
    }

    Ok(parts)
}

fn parse_field(token: &str, pattern: &str) -> Result<Field, TemplateError> {
    let (name, spec) = match token.split_once(':') {
        Some((name, spec)) => (name, Some(spec)),
        None => (token, None),
    };
    if name.is_empty() {
        return Err(TemplateError::EmptyPlaceholder {
            pattern: pattern.to_string(),
        });
    }
    let placeholder =
        Placeholder::from_name(name).ok_or_else(|| TemplateError::UnknownPlaceholder {
            name: name.to_string(),
            pattern: pattern.to_string(),
        })?;

    Ok(Field {
        placeholder,
        spec: spec.map(str::to_string),
        format: compile_format(placeholder, spec, pattern)?,
    })
}

fn compile_format(
    placeholder: Placeholder,
    spec: Option<&str>,
    pattern: &str,
) -> Result<FieldFormat, TemplateError> {
    let raw = spec.unwrap_or_default();
    let invalid = |reason: &str| TemplateError::InvalidFormat {
        placeholder: placeholder.name().to_string(),
        spec: raw.to_string(),
        reason: reason.to_string(),
        pattern: pattern.to_string(),
    };

    match placeholder.kind() {
        ValueKind::Integer => parse_pad_spec(raw, 'd', true)
            .map(FieldFormat::Integer)
            .map_err(invalid),
        ValueKind::Text => parse_pad_spec(raw, 's', false)
            .map(FieldFormat::Text)
            .map_err(invalid),
        ValueKind::DateTime => {
            if raw.is_empty() {
                return Ok(FieldFormat::DateTime(DEFAULT_DATE_FORMAT.to_string()));
            }
            if StrftimeItems::new(raw).any(|item| matches!(item, Item::Error)) {
                return Err(invalid("日時の書式コードが不正です"));
            }
            Ok(FieldFormat::DateTime(raw.to_string()))
        }
    }
}

fn parse_align(ch: char) -> Option<Align> {
    match ch {
        '<' => Some(Align::Left),
        '>' => Some(Align::Right),
        '^' => Some(Align::Center),
        '=' => Some(Align::AfterSign),
        _ => None,
    }
}

fn parse_pad_spec(spec: &str, type_char: char, numeric: bool) -> Result<PadSpec, &'static str> {
    let chars: Vec<char> = spec.chars().collect();
    let mut i = 0usize;
    let mut out = PadSpec {
        fill: None,
        align: None,
        sign: Sign::Minus,
        zero: false,
        width: 0,
    };

    if let Some(align) = chars.get(1).copied().and_then(parse_align) {
        out.fill = Some(chars[0]);
        out.align = Some(align);
        i = 2;
    } else if let Some(align) = chars.first().copied().and_then(parse_align) {
        out.align = Some(align);
        i = 1;
    }

    if let Some(sign) = chars.get(i).and_then(|c| match c {
        '+' => Some(Sign::Plus),
        '-' => Some(Sign::Minus),
        ' ' => Some(Sign::Space),
        _ => None,
    }) {
        if !numeric {
            return Err("文字列に符号は指定できません");
        }
        out.sign = sign;
        i += 1;
    }

    if chars.get(i) == Some(&'0') {
        out.zero = true;
        i += 1;
    }

    let width_start = i;
    while chars.get(i).is_some_and(char::is_ascii_digit) {
        i += 1;
    }
    if i > width_start {
        let digits: String = chars[width_start..i].iter().collect();
        out.width = digits
            .parse()
            .ok()
            .filter(|width| *width <= MAX_WIDTH)
            .ok_or("幅は255以下にしてください")?;
    }

    match &chars[i..] {
        [] => {}
        [c] if *c == type_char => {}
        _ => {
            return Err(if numeric {
                "整数には使用できない書式です"
            } else {
                "文字列には使用できない書式です"
            })
        }
    }

    if !numeric && out.align == Some(Align::AfterSign) {
        return Err("文字列には '=' 揃えは使用できません");
    }

    Ok(out)
}

fn format_integer(value: i64, spec: &PadSpec) -> String {
    let sign = if value < 0 {
        "-"
    } else {
        match spec.sign {
            Sign::Plus => "+",
            Sign::Space => " ",
            Sign::Minus => "",
        }
    };
    let digits = value.unsigned_abs().to_string();
    let fill = spec.fill.unwrap_or(if spec.zero { '0' } else { ' ' });
    let align = spec.align.unwrap_or(if spec.zero {
        Align::AfterSign
    } else {
        Align::Right
    });
    pad(sign, &digits, fill, align, spec.width)
}

fn format_text(value: &str, spec: &PadSpec) -> String {
    let fill = spec.fill.unwrap_or(if spec.zero { '0' } else { ' ' });
    pad("", value, fill, spec.align.unwrap_or(Align::Left), spec.width)
}

fn pad(sign: &str, body: &str, fill: char, align: Align, width: usize) -> String {
    let len = sign.chars().count() + body.chars().count();
    if len >= width {
        return format!("{sign}{body}");
    }
    let missing = width - len;
    let repeat = |n: usize| std::iter::repeat(fill).take(n).collect::<String>();
    match align {
        Align::Left => format!("{sign}{body}{}", repeat(missing)),
        Align::Right => format!("{}{sign}{body}", repeat(missing)),
        Align::Center => {
            let left = missing / 2;
            format!("{}{sign}{body}{}", repeat(left), repeat(missing - left))
        }
        Align::AfterSign => format!("{sign}{}{body}", repeat(missing)),
    }
}

fn write_date(output: &mut String, value: &DateTime<Local>, fmt: &str) -> std::fmt::Result {
    write!(output, "{}", value.format_with_items(StrftimeItems::new(fmt)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DateSource;
    use chrono::TimeZone;

    fn context(counter: i64) -> NamingContext {
        let date = Local
            .with_ymd_and_hms(2023, 5, 1, 8, 30, 15)
            .single()
            .expect("valid time");
        let mtime = Local
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .single()
            .expect("valid time");
        NamingContext {
            counter,
            orig: "photo".to_string(),
            ext: "JPG".to_string(),
            date,
            date_source: DateSource::Exif,
            mtime,
            prefix: "pre_".to_string(),
            suffix: "_suf".to_string(),
        }
    }

    fn render(pattern: &str, counter: i64) -> String {
        expand(pattern, &context(counter), None).expect("must render")
    }

    #[test]
    fn counter_with_zero_padding_spec() {
        assert_eq!(render("IMG_{counter:04d}", 3), "IMG_0003");
    }

    #[test]
    fn date_with_strftime_spec() {
        assert_eq!(render("{date:%Y%m%d}_{orig}", 1), "20230501_photo");
    }

    #[test]
    fn mtime_is_independent_from_date() {
        assert_eq!(render("{mtime:%Y-%m-%d}", 1), "2024-01-02");
    }

    #[test]
    fn bare_date_uses_default_format() {
        assert_eq!(render("{date}", 1), "2023-05-01 08:30:15");
    }

    #[test]
    fn string_fields_render_verbatim() {
        assert_eq!(render("{prefix}{orig}{suffix}.{ext}", 1), "pre_photo_suf.JPG");
    }

    #[test]
    fn escaped_braces_are_literal() {
        assert_eq!(render("{{{counter}}}", 9), "{9}");
    }

    #[test]
    fn integer_alignment_and_sign() {
        assert_eq!(render("{counter:>4}", 7), "   7");
        assert_eq!(render("{counter:*<4d}", 7), "7***");
        assert_eq!(render("{counter:^5}", 7), "  7  ");
        assert_eq!(render("{counter:+03d}", 7), "+07");
        assert_eq!(render("{counter:04d}", -7), "-007");
    }

    #[test]
    fn text_width_pads_left_aligned() {
        assert_eq!(render("[{orig:8}]", 1), "[photo   ]");
        assert_eq!(render("[{orig:_>8s}]", 1), "[___photo]");
    }

    #[test]
    fn zero_pad_digits_applies_to_bare_counter_only() {
        let ctx = context(5);
        assert_eq!(expand("{counter}", &ctx, Some(3)).expect("render"), "005");
        assert_eq!(expand("{counter:d}", &ctx, Some(3)).expect("render"), "5");
        assert_eq!(expand("{counter:02d}", &ctx, Some(6)).expect("render"), "05");
        assert_eq!(expand("{counter}", &ctx, Some(0)).expect("render"), "5");
    }

    #[test]
    fn zero_pad_digits_rewrites_the_parsed_spec() {
        let template = Template::parse("n{counter}")
            .and_then(|t| t.with_counter_padding(Some(4)))
            .expect("parse");
        let TemplatePart::Field(field) = &template.parts()[1] else {
            panic!("expected field");
        };
        assert_eq!(field.spec(), Some("04d"));
    }

    #[test]
    fn unknown_placeholder_is_rejected() {
        let err = Template::parse("{unknown}_{counter}").expect_err("must fail");
        assert_eq!(
            err,
            TemplateError::UnknownPlaceholder {
                name: "unknown".to_string(),
                pattern: "{unknown}_{counter}".to_string(),
            }
        );
    }

    #[test]
    fn date_code_on_integer_is_rejected() {
        let err = Template::parse("{counter:%Y}").expect_err("must fail");
        assert!(matches!(
            err,
            TemplateError::InvalidFormat { ref placeholder, .. } if placeholder == "counter"
        ));
    }

    #[test]
    fn sign_on_text_is_rejected() {
        let err = Template::parse("{orig:+5}").expect_err("must fail");
        assert!(matches!(err, TemplateError::InvalidFormat { .. }));
    }

    #[test]
    fn width_above_file_name_limit_is_rejected() {
        assert!(Template::parse("{counter:0255d}").is_ok());
        assert!(Template::parse("{orig:>255}").is_ok());
        for pattern in ["{counter:0256d}", "{orig:>256}", "{counter:0999999999999d}"] {
            let err = Template::parse(pattern).expect_err(pattern);
            assert!(matches!(err, TemplateError::InvalidFormat { .. }), "{pattern}");
        }

        let padded = Template::parse("{counter}").expect("parse");
        assert!(matches!(
            padded.with_counter_padding(Some(10_000)).expect_err("must fail"),
            TemplateError::InvalidFormat { ref spec, .. } if spec == "010000d"
        ));
    }

    #[test]
    fn bad_strftime_code_is_rejected() {
        let err = Template::parse("{date:%Q}").expect_err("must fail");
        assert!(matches!(
            err,
            TemplateError::InvalidFormat { ref placeholder, .. } if placeholder == "date"
        ));
    }

    #[test]
    fn unbalanced_and_empty_patterns_are_rejected() {
        assert_eq!(Template::parse("").expect_err("empty"), TemplateError::Empty);
        assert!(matches!(
            Template::parse("{counter").expect_err("open"),
            TemplateError::UnbalancedBraces { .. }
        ));
        assert!(matches!(
            Template::parse("counter}").expect_err("close"),
            TemplateError::UnbalancedBraces { .. }
        ));
        assert!(matches!(
            Template::parse("{}").expect_err("anonymous"),
            TemplateError::EmptyPlaceholder { .. }
        ));
    }

    #[test]
    fn references_ext_only_for_recognized_placeholder() {
        assert!(Template::parse("{orig}.{ext}").expect("parse").references(Placeholder::Ext));
        assert!(Template::parse("{orig}.{ext:>3}").expect("parse").references(Placeholder::Ext));
        assert!(!Template::parse("{{ext}}_{orig}").expect("parse").references(Placeholder::Ext));
    }

    #[test]
    fn error_message_names_pattern_and_placeholder() {
        let err = Template::parse("{foo}").expect_err("must fail");
        let message = err.to_string();
        assert!(message.contains("{foo}"));
        assert!(message.contains("pattern={foo}"));
    }
}
