//! Message addresses (RFC 5322 §3.4).

/// An address as given by the caller.
///
/// # Examples
/// - `Address::from("user@example.com")` → bare mailbox
/// - `Address::from(("Juan García", "juan@ejemplo.com"))` → named mailbox
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Address {
    /// A bare mailbox, written verbatim.
    Bare(String),
    /// A display name (possibly non-ASCII) and a mailbox.
    Named { name: String, mailbox: String },
}

impl Address {
    /// Build a named address.
    pub fn named(name: impl Into<String>, mailbox: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            mailbox: mailbox.into(),
        }
    }

    /// The mailbox part, used for the SMTP envelope.
    pub fn mailbox(&self) -> &str {
        match self {
            Self::Bare(mailbox) => mailbox,
            Self::Named { mailbox, .. } => mailbox,
        }
    }

    /// The display name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Bare(_) => None,
            Self::Named { name, .. } => Some(name),
        }
    }

    /// Parse a single address written by a human.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let (Some(angle_start), Some(angle_end)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if angle_end > angle_start {
                let mailbox = trimmed[angle_start + 1..angle_end].trim().to_string();
                let name = strip_quotes(&trimmed[..angle_start]);
                if name.is_empty() {
                    return Self::Bare(mailbox);
                }
                return Self::Named { name, mailbox };
            }
        }

        Self::Bare(trimmed.to_string())
    }

    /// Parse a comma-separated list of addresses.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' if !in_quotes && !in_angle => {
                    push_parsed(&mut results, &current);
                    current.clear();
                }
                _ => current.push(ch),
            }
        }
        push_parsed(&mut results, &current);

        results
    }
}

fn push_parsed(results: &mut Vec<Address>, segment: &str) {
    let addr = Address::parse(segment);
    if !addr.mailbox().is_empty() {
        results.push(addr);
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl From<&str> for Address {
    fn from(mailbox: &str) -> Self {
        Self::Bare(mailbox.to_string())
    }
}

impl From<String> for Address {
    fn from(mailbox: String) -> Self {
        Self::Bare(mailbox)
    }
}

impl<N: Into<String>, M: Into<String>> From<(N, M)> for Address {
    fn from((name, mailbox): (N, M)) -> Self {
        Self::named(name, mailbox)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bare(mailbox) => f.write_str(mailbox),
            Self::Named { name, mailbox } => write!(f, "{name} <{mailbox}>"),
        }
    }
}
