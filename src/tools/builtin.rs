//! Built-in text transforms used when no external command is configured

use crate::tools::{AssetTool, ToolError, ToolInput};
use async_trait::async_trait;
use regex::{Captures, Regex};

/// Returns the input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

#[async_trait]
impl AssetTool for Passthrough {
    async fn apply(&self, input: &ToolInput) -> Result<Vec<u8>, ToolError> {
        Ok(input.contents.clone())
    }
}

/// Stands in for a required tool that was configured away; always fails
#[derive(Debug, Clone)]
pub struct Unavailable {
    name: &'static str,
}

impl Unavailable {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl AssetTool for Unavailable {
    async fn apply(&self, _input: &ToolInput) -> Result<Vec<u8>, ToolError> {
        Err(ToolError::Invalid(format!(
            "no {} command is configured (set tools.{} in the config)",
            self.name, self.name
        )))
    }
}

/// Conservative CSS minifier: strips comments (keeping `/*!` licenses) and whitespace
#[derive(Debug, Clone)]
pub struct CssMinifier {
    comments: Regex,
    whitespace: Regex,
    punctuation: Regex,
    last_semicolon: Regex,
}

impl CssMinifier {
    pub fn new() -> Self {
        Self {
            comments: Regex::new(r"(?s)/\*[^!].*?\*/").expect("valid regex"),
            whitespace: Regex::new(r"\s+").expect("valid regex"),
            punctuation: Regex::new(r"\s*([{};,>])\s*").expect("valid regex"),
            last_semicolon: Regex::new(r";}").expect("valid regex"),
        }
    }

    pub fn minify(&self, css: &str) -> String {
        let css = self.comments.replace_all(css, "");
        let css = self.whitespace.replace_all(&css, " ");
        let css = self.punctuation.replace_all(&css, "$1");
        let css = self.last_semicolon.replace_all(&css, "}");
        css.trim().to_string()
    }
}

impl Default for CssMinifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetTool for CssMinifier {
    async fn apply(&self, input: &ToolInput) -> Result<Vec<u8>, ToolError> {
        Ok(self.minify(input.text()?).into_bytes())
    }
}

/// Mirrors a left-to-right stylesheet for right-to-left layouts.
///
/// Only declarations inside rule blocks are touched: `left`/`right` and
/// `ltr`/`rtl` are swapped in property names and values, and four-value
/// box shorthands swap their horizontal components.
#[derive(Debug, Clone)]
pub struct BidiMirror {
    block: Regex,
    declaration: Regex,
    direction: Regex,
}

const BOX_SHORTHANDS: &[&str] = &[
    "margin",
    "padding",
    "border-width",
    "border-style",
    "border-color",
];

impl BidiMirror {
    pub fn new() -> Self {
        Self {
            block: Regex::new(r"\{([^{}]*)\}").expect("valid regex"),
            declaration: Regex::new(r"(?P<prop>-?[A-Za-z][A-Za-z-]*)(?P<sep>\s*:\s*)(?P<value>[^;{}]+)")
                .expect("valid regex"),
            direction: Regex::new(r"\b(left|right|ltr|rtl)\b").expect("valid regex"),
        }
    }

    fn swap_direction(&self, text: &str) -> String {
        self.direction
            .replace_all(text, |caps: &Captures| match &caps[1] {
                "left" => "right",
                "right" => "left",
                "ltr" => "rtl",
                _ => "ltr",
            })
            .into_owned()
    }

    fn mirror_value(&self, prop: &str, value: &str) -> String {
        let trimmed = value.trim_end();
        let trailing = &value[trimmed.len()..];
        let parts: Vec<&str> = trimmed.split_whitespace().collect();

        if parts.len() == 4 && BOX_SHORTHANDS.contains(&prop) {
            return format!("{} {} {} {}{}", parts[0], parts[3], parts[2], parts[1], trailing);
        }
        if parts.len() == 4 && prop == "border-radius" {
            return format!("{} {} {} {}{}", parts[1], parts[0], parts[3], parts[2], trailing);
        }
        if value.contains("url(") {
            return value.to_string();
        }
        self.swap_direction(value)
    }

    fn mirror_block(&self, body: &str) -> String {
        self.declaration
            .replace_all(body, |caps: &Captures| {
                let prop = &caps["prop"];
                let value = self.mirror_value(&prop.to_ascii_lowercase(), &caps["value"]);
                format!("{}{}{}", self.swap_direction(prop), &caps["sep"], value)
            })
            .into_owned()
    }

    pub fn mirror(&self, css: &str) -> String {
        self.block
            .replace_all(css, |caps: &Captures| format!("{{{}}}", self.mirror_block(&caps[1])))
            .into_owned()
    }
}

impl Default for BidiMirror {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetTool for BidiMirror {
    async fn apply(&self, input: &ToolInput) -> Result<Vec<u8>, ToolError> {
        Ok(self.mirror(input.text()?).into_bytes())
    }
}

/// Rewrites SCSS variables, mixins and interpolation into the LESS dialect
#[derive(Debug, Clone)]
pub struct ScssToLess {
    interpolation: Regex,
    mixin: Regex,
    include: Regex,
    extend: Regex,
    variable: Regex,
    default_flag: Regex,
}

impl ScssToLess {
    pub fn new() -> Self {
        Self {
            interpolation: Regex::new(r"#\{\$([\w-]+)\}").expect("valid regex"),
            mixin: Regex::new(r"@mixin\s+([\w-]+)\s*(\([^)]*\))?").expect("valid regex"),
            include: Regex::new(r"@include\s+([\w-]+)\s*(\([^)]*\))?\s*;").expect("valid regex"),
            extend: Regex::new(r"@extend\s+([^;]+);").expect("valid regex"),
            variable: Regex::new(r"\$([A-Za-z_][\w-]*)").expect("valid regex"),
            default_flag: Regex::new(r"\s*!default").expect("valid regex"),
        }
    }

    pub fn convert(&self, scss: &str) -> String {
        let less = self.interpolation.replace_all(scss, "@{$1}");
        let less = self.mixin.replace_all(&less, |caps: &Captures| {
            let args = caps.get(2).map_or("()", |m| m.as_str());
            format!(".{}{}", &caps[1], args)
        });
        let less = self.include.replace_all(&less, |caps: &Captures| {
            let args = caps.get(2).map_or("", |m| m.as_str());
            format!(".{}{};", &caps[1], args)
        });
        let less = self.extend.replace_all(&less, "&:extend($1);");
        let less = self.variable.replace_all(&less, "@$1");
        let less = self.default_flag.replace_all(&less, "");
        less.into_owned()
    }
}

impl Default for ScssToLess {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetTool for ScssToLess {
    async fn apply(&self, input: &ToolInput) -> Result<Vec<u8>, ToolError> {
        Ok(self.convert(input.text()?).into_bytes())
    }
}
