use super::LogEvent;

/// `asctime | name | levelname | message`.
pub const DEFAULT_FORMAT: &str = "{time} | {name} | {level} | {message}";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Time,
    Name,
    Level,
    Prefix,
    Message,
}

/// Line template with `{time}`, `{name}`, `{level}`, `{prefix}` and `{message}` fields.
///
/// Unknown `{...}` groups are kept literally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFormat {
    template: String,
    segments: Vec<Segment>,
    multiline_yaml: bool,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::new(DEFAULT_FORMAT)
    }
}

impl LogFormat {
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let segments = parse(&template);
        Self {
            template,
            segments,
            multiline_yaml: false,
        }
    }

    /// Render multi-line messages as a YAML-style block: `first |` then two-space indented lines.
    pub fn with_multiline_yaml(mut self, enabled: bool) -> Self {
        self.multiline_yaml = enabled;
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn render(&self, event: &LogEvent) -> String {
        let message = if self.multiline_yaml {
            yaml_multiline(&event.message)
        } else {
            event.message.clone()
        };
        let mut out = String::with_capacity(self.template.len() + message.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Time => out.push_str(&event.timestamp.format(TIME_FORMAT).to_string()),
                Segment::Name => out.push_str(&event.logger),
                Segment::Level => out.push_str(event.level.as_str()),
                Segment::Prefix => out.push_str(&event.prefix),
                Segment::Message => out.push_str(&message),
            }
        }
        out
    }
}

fn yaml_multiline(message: &str) -> String {
    match message.split_once('\n') {
        Some((first, rest)) => {
            let indented: Vec<&str> = rest.split('\n').collect();
            format!("{} |\n  {}", first, indented.join("\n  "))
        }
        None => message.to_string(),
    }
}

fn parse(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        literal.push_str(&rest[..open]);
        let after = &rest[open..];
        let Some(close) = after.find('}') else {
            // Unclosed `{...` is literal text.
            literal.push_str(after);
            rest = "";
            break;
        };
        let field = match &after[1..close] {
            "time" => Some(Segment::Time),
            "name" => Some(Segment::Name),
            "level" => Some(Segment::Level),
            "prefix" => Some(Segment::Prefix),
            "message" => Some(Segment::Message),
            _ => None,
        };
        match field {
            Some(seg) => {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(seg);
            }
            None => literal.push_str(&after[..=close]),
        }
        rest = &after[close + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    segments
}
