//! Shape checks for plan bodies returned by the agent.
//!
//! Plans are free-form markdown; only the header, the four section headings and
//! the priority value are inspected.

use std::sync::LazyLock;

use regex::Regex;

/// Section headings every plan must carry, in contract order.
pub const REQUIRED_SECTIONS: [&str; 4] = ["Summary", "Action Items", "Priority", "Notes"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    fn parse(raw: &str) -> Option<Self> {
        let cleaned = raw.trim_matches(|c: char| c.is_whitespace() || "*[]_`".contains(c));
        match cleaned.to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

/// What `inspect_plan` found in a plan body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanShape {
    /// Item name from the `# EMAIL PLAN: <name>` header, if present.
    pub header_name: Option<String>,
    pub missing_sections: Vec<&'static str>,
    pub priority: Option<Priority>,
}

impl PlanShape {
    /// Human-readable problems, empty when the plan matches the contract for `item_name`.
    pub fn problems(&self, item_name: &str) -> Vec<String> {
        let mut problems = Vec::new();
        match self.header_name.as_deref() {
            None => problems.push("missing '# EMAIL PLAN:' header".to_string()),
            Some(name) if name != item_name => {
                problems.push(format!("header names '{name}', expected '{item_name}'"));
            }
            Some(_) => {}
        }
        for section in &self.missing_sections {
            problems.push(format!("missing '## {section}' section"));
        }
        if self.priority.is_none() && !self.missing_sections.contains(&"Priority") {
            problems.push("priority must be High, Medium or Low".to_string());
        }
        problems
    }
}

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^#[ \t]*EMAIL PLAN:[ \t]*(.+?)[ \t]*$")
        .expect("header regex should be valid")
});
static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^##[ \t]+(.+?)[ \t]*$").expect("section regex should be valid")
});

pub fn inspect_plan(body: &str) -> PlanShape {
    let header_name = HEADER_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    let headings: Vec<(String, usize)> = SECTION_RE
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let title = caps.get(1)?.as_str().trim().to_string();
            Some((title, whole.end()))
        })
        .collect();

    let missing_sections = REQUIRED_SECTIONS
        .iter()
        .copied()
        .filter(|section| !headings.iter().any(|(title, _)| title == section))
        .collect();

    let priority = headings
        .iter()
        .position(|(title, _)| title == "Priority")
        .and_then(|idx| {
            let start = headings[idx].1;
            body[start..]
                .lines()
                .map(str::trim)
                .take_while(|line| !line.starts_with('#'))
                .find(|line| !line.is_empty())
                .and_then(Priority::parse)
        });

    PlanShape {
        header_name,
        missing_sections,
        priority,
    }
}
