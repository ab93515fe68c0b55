use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailAction {
    pub label: String,
    pub url: String,
}

/// A plain mail message: greeting, lines before and after an optional call to action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MailMessage {
    pub subject: String,
    pub greeting: String,
    pub intro_lines: Vec<String>,
    pub action: Option<MailAction>,
    pub outro_lines: Vec<String>,
}

impl MailMessage {
    pub fn new(subject: impl Into<String>, greeting: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            greeting: greeting.into(),
            intro_lines: Vec::new(),
            action: None,
            outro_lines: Vec::new(),
        }
    }

    /// Lines land before the action until one is set, after it afterwards.
    pub fn line(mut self, line: impl Into<String>) -> Self {
        if self.action.is_none() {
            self.intro_lines.push(line.into());
        } else {
            self.outro_lines.push(line.into());
        }
        self
    }

    pub fn line_opt(self, line: Option<impl Into<String>>) -> Self {
        match line {
            Some(line) => self.line(line),
            None => self,
        }
    }

    pub fn action(mut self, label: impl Into<String>, url: impl Into<String>) -> Self {
        self.action = Some(MailAction {
            label: label.into(),
            url: url.into(),
        });
        self
    }

    pub fn text_body(&self) -> String {
        let mut body = String::new();
        body.push_str(&self.greeting);
        body.push_str("\n\n");

        for line in &self.intro_lines {
            body.push_str(line);
            body.push('\n');
        }

        if let Some(action) = &self.action {
            body.push('\n');
            body.push_str(&format!("{}: {}\n\n", action.label, action.url));
        }

        for line in &self.outro_lines {
            body.push_str(line);
            body.push('\n');
        }

        body
    }
}
