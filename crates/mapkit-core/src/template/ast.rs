//! Template syntax tree

use super::expression::{Condition, FilterChain};

/// One node of a compiled template
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Literal text
    Text(String),
    /// `{{ chain }}` or `{% echo chain %}`
    Output { chain: FilterChain, position: usize },
    /// `if` / `unless` with their `elsif` and `else` branches
    Conditional {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },
    /// `{% assign name = chain %}`
    Assign { name: String, chain: FilterChain },
    /// `{% capture name %}body{% endcapture %}`
    Capture { name: String, body: Vec<Node> },
}

/// A guarded block of a conditional
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Condition,
    /// Set for the leading branch of `unless`
    pub negate: bool,
    pub body: Vec<Node>,
}
