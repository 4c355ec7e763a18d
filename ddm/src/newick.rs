//! Newick reader.
//!
//! A Newick string may or may not carry branch lengths, leaf names and
//! internal node names. [`NewickFormat::detect`] checks the raw text for each
//! of the three, and the single scanner below honours only the fields the
//! detected format says are present. Everything else gets a generated name:
//! `Leaf 0`, `Leaf 1`, ... for leaves and `Node 1`, `Node 2`, ... for
//! internal nodes, numbered in the order they appear in the text.
//!
//! Names are made unique within one tree: a repeated name gets the suffix
//! `" (N)"` with the smallest N not used yet, so `(A,A,A);` gives the leaves
//! `A`, `A (1)` and `A (2)`. Generated names, the root's included, are
//! claimed after every name in the text, so they never take a name the text
//! uses.
//!
//! Labels may be single-quoted to hold punctuation or surrounding spaces, with
//! `''` standing for a quote. [`Tree::to_newick`] writes such labels quoted.

use crate::error::{Error, NewickError, Result};
use crate::tree::{NodeId, Tree};
use log::{debug, warn};
use std::collections::HashSet;

/// Name given to the root when the string does not name it.
pub const DEFAULT_ROOT_NAME: &str = "Root";

/// Characters that may appear in a Newick string without it containing any
/// names: the structural punctuation plus everything needed to write a number.
const NUMERIC_OR_STRUCTURAL: &[char] = &[
    '(', ',', ')', ';', ':', '.', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Which optional fields a Newick string carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NewickFormat {
    /// Branch lengths (`:0.1`) are present.
    pub distances: bool,
    /// Leaves are named.
    pub leaf_names: bool,
    /// Internal nodes are named.
    pub node_names: bool,
}

impl NewickFormat {
    /// Classifies a Newick string into one of the six supported formats.
    ///
    /// Whitespace is ignored and nothing after the first `;` is looked at.
    /// A quoted label counts as a name whatever it contains. Named internal
    /// nodes without named leaves are rejected.
    pub fn detect(newick: &str) -> std::result::Result<Self, NewickError> {
        let masked = mask_quoted(newick);
        let body = masked.split(';').next().unwrap_or_default();
        let chars = || body.chars().filter(|c| !c.is_whitespace());

        let distances = chars().any(|c| c == ':');
        let leaf_names = chars().any(|c| !NUMERIC_OR_STRUCTURAL.contains(&c));
        let mut node_names = false;
        let mut after_close = false;
        for c in chars() {
            if after_close && !matches!(c, ',' | ')' | ':') {
                node_names = true;
                break;
            }
            after_close = c == ')';
        }

        if node_names && !leaf_names {
            return Err(NewickError::UnsupportedFormat);
        }
        Ok(Self {
            distances,
            leaf_names,
            node_names,
        })
    }

    /// The conventional number of the format: 0 = bare topology,
    /// 1 = distances only, 2 = leaf names, 3 = all names, 4 = leaf names and
    /// distances, 5 = all names and distances.
    pub fn number(&self) -> u8 {
        match (self.distances, self.leaf_names, self.node_names) {
            (false, false, _) => 0,
            (true, false, _) => 1,
            (false, true, false) => 2,
            (false, true, true) => 3,
            (true, true, false) => 4,
            (true, true, true) => 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Comma,
    Colon,
    Semicolon,
    Text(String),
    UnclosedQuote,
}

/// Reads a single-quoted label whose opening quote was already consumed.
/// A doubled quote stands for one quote. Returns the label and the number of
/// bytes read, closing quote included.
fn read_quoted(rest: &str) -> Option<(String, usize)> {
    let mut label = String::new();
    let mut chars = rest.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\'' && chars.next_if(|&(_, next)| next == '\'').is_none() {
            return Some((label, i + 1));
        }
        label.push(c);
    }
    None
}

/// Replaces every quoted label by a single name character, so punctuation
/// inside quotes does not count as structure.
fn mask_quoted(newick: &str) -> String {
    let mut out = String::with_capacity(newick.len());
    let mut rest = newick;
    while let Some(start) = rest.find('\'') {
        out.push_str(&rest[..start]);
        out.push('q');
        match read_quoted(&rest[start + 1..]) {
            Some((_, len)) => rest = &rest[start + 1 + len..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Splits a Newick string into structural characters and the text between
/// them. Bare text is trimmed and whitespace-only runs are dropped; quoted
/// text is kept as written. Stops after the first `;`.
struct Tokens<'a> {
    input: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> Tokens<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            done: false,
        }
    }
}

impl Iterator for Tokens<'_> {
    type Item = (usize, Token);

    fn next(&mut self) -> Option<(usize, Token)> {
        while !self.done && self.pos < self.input.len() {
            let start = self.pos;
            let rest = &self.input[start..];
            let c = rest.chars().next()?;
            let token = match c {
                '(' => Token::Open,
                ')' => Token::Close,
                ',' => Token::Comma,
                ':' => Token::Colon,
                ';' => {
                    self.done = true;
                    Token::Semicolon
                }
                '\'' => {
                    return Some(match read_quoted(&rest[1..]) {
                        Some((label, len)) => {
                            self.pos += 1 + len;
                            (start, Token::Text(label))
                        }
                        None => {
                            self.done = true;
                            (start, Token::UnclosedQuote)
                        }
                    });
                }
                _ => {
                    let len = rest
                        .find(&['(', ')', ',', ':', ';', '\''][..])
                        .unwrap_or(rest.len());
                    self.pos += len;
                    let text = rest[..len].trim();
                    if text.is_empty() {
                        continue;
                    }
                    return Some((start, Token::Text(text.to_string())));
                }
            };
            self.pos += c.len_utf8();
            return Some((start, token));
        }
        None
    }
}

/// Hands out names that are unique within one parse.
#[derive(Debug, Default)]
struct NameRegistry {
    used: HashSet<String>,
}

impl NameRegistry {
    fn claim(&mut self, name: &str) -> String {
        let mut candidate = name.to_string();
        let mut n = 0;
        while self.used.contains(&candidate) {
            n += 1;
            candidate = format!("{name} ({n})");
        }
        self.used.insert(candidate.clone());
        candidate
    }
}

/// A node as scanned, before it is placed in a [`Tree`]. Drafts are created
/// in text order, so every parent comes before its children.
#[derive(Debug)]
struct Draft {
    name: String,
    parent: Option<usize>,
    distance: f64,
    leaf: bool,
    /// Still carries a placeholder name that has not been claimed.
    generated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    BetweenElements,
    JustClosed(usize),
}

struct Scanner {
    format: NewickFormat,
    drafts: Vec<Draft>,
    names: NameRegistry,
    leaf_count: usize,
    node_count: usize,
    state: State,
    /// Draft that new elements are added to; `None` before the first `(` and
    /// after the root has been closed.
    current: Option<usize>,
    opened: bool,
    label: Option<String>,
    length: Option<String>,
    after_colon: bool,
}

impl Scanner {
    fn new(format: NewickFormat) -> Self {
        Self {
            format,
            drafts: vec![Draft {
                name: DEFAULT_ROOT_NAME.to_string(),
                parent: None,
                distance: 0.0,
                leaf: false,
                generated: true,
            }],
            names: NameRegistry::default(),
            leaf_count: 0,
            node_count: 0,
            state: State::BetweenElements,
            current: None,
            opened: false,
            label: None,
            length: None,
            after_colon: false,
        }
    }

    fn scan(mut self, newick: &str) -> Result<Vec<Draft>> {
        for (pos, token) in Tokens::new(newick) {
            match token {
                Token::Open => self.open(pos)?,
                Token::UnclosedQuote => return Err(unexpected('\'', pos)),
                Token::Text(text) => self.text(pos, text)?,
                Token::Colon => {
                    if self.after_colon {
                        return Err(unexpected(':', pos));
                    }
                    self.after_colon = true;
                }
                Token::Comma => {
                    let parent = self.current.ok_or_else(|| unexpected(',', pos))?;
                    self.flush(parent)?;
                    self.state = State::BetweenElements;
                }
                Token::Close => {
                    let closing = self
                        .current
                        .ok_or(NewickError::UnbalancedParentheses(pos))?;
                    self.flush(closing)?;
                    self.state = State::JustClosed(closing);
                    self.current = self.drafts[closing].parent;
                }
                Token::Semicolon => {
                    if self.current.is_some() {
                        return Err(NewickError::UnbalancedParentheses(pos).into());
                    }
                    if !self.opened && self.label.is_none() && self.length.is_none() {
                        return Err(NewickError::Empty.into());
                    }
                    // a bare leaf such as "A;" hangs directly below the root
                    self.flush(0)?;
                    // placeholders yield to names from the text
                    for draft in self.drafts.iter_mut().filter(|d| d.generated) {
                        draft.name = self.names.claim(&draft.name);
                    }
                    return Ok(self.drafts);
                }
            }
        }
        if self.current.is_some() {
            Err(NewickError::UnbalancedParentheses(newick.len()).into())
        } else {
            Err(NewickError::MissingSemicolon.into())
        }
    }

    fn open(&mut self, pos: usize) -> Result<()> {
        if self.state != State::BetweenElements || self.label.is_some() || self.after_colon {
            return Err(unexpected('(', pos));
        }
        if !self.opened {
            // the first bracket is the root itself
            self.opened = true;
            self.current = Some(0);
        } else {
            let parent = self.current.ok_or_else(|| unexpected('(', pos))?;
            self.node_count += 1;
            self.drafts.push(Draft {
                name: format!("Node {}", self.node_count),
                parent: Some(parent),
                distance: 0.0,
                leaf: false,
                generated: true,
            });
            self.current = Some(self.drafts.len() - 1);
        }
        Ok(())
    }

    fn text(&mut self, pos: usize, text: String) -> Result<()> {
        let slot = if self.after_colon {
            &mut self.length
        } else {
            &mut self.label
        };
        if slot.is_some() {
            return Err(unexpected(text.chars().next().unwrap_or(' '), pos));
        }
        *slot = Some(text);
        Ok(())
    }

    /// Ends the current element: either the node that was just closed gets
    /// its name and branch length, or a new leaf is added below `parent`.
    fn flush(&mut self, parent: usize) -> Result<()> {
        let label = self.label.take();
        let distance = match self.length.take() {
            Some(text) if self.format.distances => parse_distance(&text)?,
            _ => 0.0,
        };
        self.after_colon = false;

        match self.state {
            State::JustClosed(closed) => {
                if let Some(label) = label.filter(|_| self.format.node_names) {
                    self.drafts[closed].name = self.names.claim(&label);
                    self.drafts[closed].generated = false;
                }
                if closed == 0 && distance != 0.0 {
                    return Err(Error::structural("a root can not have a non-zero distance"));
                }
                self.drafts[closed].distance = distance;
            }
            State::BetweenElements => {
                let (name, generated) = match label.filter(|_| self.format.leaf_names) {
                    Some(label) => (self.names.claim(&label), false),
                    None => {
                        self.leaf_count += 1;
                        (format!("Leaf {}", self.leaf_count - 1), true)
                    }
                };
                self.drafts.push(Draft {
                    name,
                    parent: Some(parent),
                    distance,
                    leaf: true,
                    generated,
                });
            }
        }
        Ok(())
    }
}

fn unexpected(found: char, position: usize) -> Error {
    NewickError::UnexpectedCharacter { found, position }.into()
}

/// Parses a branch length. Negative lengths, as produced by some
/// neighbour-joining tools, are clamped to zero.
fn parse_distance(text: &str) -> Result<f64> {
    let value: f64 = text
        .parse()
        .map_err(|_| NewickError::InvalidDistance(text.to_string()))?;
    if !value.is_finite() {
        return Err(NewickError::InvalidDistance(text.to_string()).into());
    }
    if value < 0.0 {
        warn!("negative branch length {value} clamped to 0");
        return Ok(0.0);
    }
    Ok(value)
}

impl Tree {
    /// Builds a tree from a Newick string.
    ///
    /// The string must end with `;`. Leaves are stored in the order they
    /// appear in the text.
    ///
    /// # Errors
    /// Returns [`Error::ParseFormat`] for text that is not a supported Newick
    /// string, and [`Error::StructuralViolation`] when the root is given a
    /// non-zero branch length.
    pub fn from_newick(name: impl Into<String>, newick: &str) -> Result<Tree> {
        let name = name.into();
        if newick.trim().is_empty() {
            return Err(NewickError::Empty.into());
        }
        let format = NewickFormat::detect(newick)?;
        debug!("tree '{}' uses Newick format {}", name, format.number());

        let drafts = Scanner::new(format).scan(newick)?;
        let mut tree = Tree::new(name, drafts[0].name.clone());

        let mut ids: Vec<NodeId> = vec![tree.root()];
        for draft in drafts.into_iter().skip(1) {
            let parent = ids[draft.parent.unwrap_or(0)];
            let id = if draft.leaf {
                tree.create_leaf(draft.name, parent, draft.distance)?
            } else {
                tree.create_node(draft.name, parent, draft.distance)?
            };
            ids.push(id);
        }
        debug!(
            "tree '{}' has {} nodes and {} leaves",
            tree.name(),
            tree.len(),
            tree.leaves().len()
        );
        Ok(tree)
    }
}
