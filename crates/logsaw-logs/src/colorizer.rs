use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;

use logsaw_types::LogEvent;

use crate::error::RuleError;
use crate::listener::Listeners;
use crate::rule::{ExpressionRule, PatternSyntax, Rule};

/// Name of the rule set installed at construction
pub const DEFAULT_RULE_SET: &str = "Default";

/// 24-bit colour
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const YELLOW: Rgb = Rgb(255, 255, 0);
}

impl FromStr for Rgb {
    type Err = String;

    /// Parse `#rrggbb` (the leading `#` is optional)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("invalid colour: {}", s));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| format!("invalid colour: {}", s))
        };
        Ok(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// An expression paired with the colours applied to matching rows
#[derive(Clone, Debug)]
pub struct ColorRule {
    rule: Arc<ExpressionRule>,
    pub background: Option<Rgb>,
    pub foreground: Option<Rgb>,
}

impl ColorRule {
    pub fn new(
        expression: &str,
        syntax: PatternSyntax,
        background: Option<Rgb>,
        foreground: Option<Rgb>,
    ) -> Result<Self, RuleError> {
        Ok(Self {
            rule: Arc::new(ExpressionRule::compile(expression, syntax)?),
            background,
            foreground,
        })
    }

    pub fn expression(&self) -> &str {
        self.rule.expression()
    }

    pub fn evaluate(&self, event: &LogEvent) -> bool {
        self.rule.evaluate(event)
    }
}

struct ColorizerState {
    sets: BTreeMap<String, Vec<ColorRule>>,
    current: String,
}

/// Picks row colours from the first matching rule of the current rule set.
///
/// Every edit fires the name of the affected rule set to the change listeners.
#[derive(Clone)]
pub struct RuleColorizer {
    state: Arc<RwLock<ColorizerState>>,
    listeners: Arc<Listeners<String>>,
}

impl RuleColorizer {
    /// A colorizer holding only the default rule set
    pub fn new() -> Self {
        let mut sets = BTreeMap::new();
        sets.insert(DEFAULT_RULE_SET.to_string(), default_rules());
        Self {
            state: Arc::new(RwLock::new(ColorizerState {
                sets,
                current: DEFAULT_RULE_SET.to_string(),
            })),
            listeners: Arc::new(Listeners::new()),
        }
    }

    /// Replace a rule set (or create it)
    pub fn set_rules(&self, name: &str, rules: Vec<ColorRule>) {
        self.state.write().sets.insert(name.to_string(), rules);
        self.listeners.fire(&name.to_string());
    }

    /// Append a rule to a rule set, creating the set if needed
    pub fn add_rule(&self, name: &str, rule: ColorRule) {
        self.state
            .write()
            .sets
            .entry(name.to_string())
            .or_default()
            .push(rule);
        self.listeners.fire(&name.to_string());
    }

    /// Remove the first rule with this expression; returns whether one was found
    pub fn remove_rule(&self, name: &str, expression: &str) -> bool {
        let removed = {
            let mut state = self.state.write();
            state.sets.get_mut(name).is_some_and(|rules| {
                match rules.iter().position(|r| r.expression() == expression) {
                    Some(index) => {
                        rules.remove(index);
                        true
                    }
                    None => false,
                }
            })
        };
        if removed {
            self.listeners.fire(&name.to_string());
        }
        removed
    }

    /// Drop every rule set, including the default one
    pub fn clear(&self) {
        self.state.write().sets.clear();
        let current = self.current_rule_set();
        self.listeners.fire(&current);
    }

    /// Switch the rule set used for colouring; the set need not exist yet
    pub fn set_current_rule_set(&self, name: &str) {
        self.state.write().current = name.to_string();
        self.listeners.fire(&name.to_string());
    }

    pub fn current_rule_set(&self) -> String {
        self.state.read().current.clone()
    }

    pub fn rule_set_names(&self) -> Vec<String> {
        self.state.read().sets.keys().cloned().collect()
    }

    pub fn rules(&self, name: &str) -> Vec<ColorRule> {
        self.state.read().sets.get(name).cloned().unwrap_or_default()
    }

    pub fn background(&self, event: &LogEvent) -> Option<Rgb> {
        self.first_match(event, |rule| rule.background)
    }

    pub fn foreground(&self, event: &LogEvent) -> Option<Rgb> {
        self.first_match(event, |rule| rule.foreground)
    }

    pub fn listeners(&self) -> &Listeners<String> {
        &self.listeners
    }

    /// Colour of the first rule that defines one and matches the event
    fn first_match<F>(&self, event: &LogEvent, color: F) -> Option<Rgb>
    where
        F: Fn(&ColorRule) -> Option<Rgb>,
    {
        let state = self.state.read();
        state
            .sets
            .get(&state.current)?
            .iter()
            .find_map(|rule| color(rule).filter(|_| rule.evaluate(event)))
    }
}

impl Default for RuleColorizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors and fatals on dark red, warnings on yellow
pub fn default_rules() -> Vec<ColorRule> {
    [
        ("level == FATAL || level == ERROR", Rgb(147, 22, 0), Rgb::WHITE),
        ("level == WARN", Rgb::YELLOW, Rgb::BLACK),
    ]
    .into_iter()
    .filter_map(|(expression, background, foreground)| {
        ColorRule::new(
            expression,
            PatternSyntax::default(),
            Some(background),
            Some(foreground),
        )
        .ok()
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsaw_types::Level;
    use parking_lot::Mutex;

    #[test]
    fn test_default_rules_color_by_level() {
        let colorizer = RuleColorizer::new();

        let error = LogEvent::new("a", Level::Error, "");
        let warn = LogEvent::new("a", Level::Warn, "");
        let info = LogEvent::new("a", Level::Info, "");

        assert_eq!(colorizer.background(&error), Some(Rgb(147, 22, 0)));
        assert_eq!(colorizer.foreground(&error), Some(Rgb::WHITE));
        assert_eq!(colorizer.background(&warn), Some(Rgb::YELLOW));
        assert_eq!(colorizer.background(&info), None);
        assert_eq!(default_rules().len(), 2);
    }

    #[test]
    fn test_first_rule_with_color_wins() {
        let colorizer = RuleColorizer::new();
        colorizer.set_rules(
            "custom",
            vec![
                ColorRule::new("msg ~= timeout", PatternSyntax::Regex, None, Some(Rgb::BLACK)).unwrap(),
                ColorRule::new("msg ~= time", PatternSyntax::Regex, Some(Rgb(1, 2, 3)), None).unwrap(),
                ColorRule::new("exists msg", PatternSyntax::Regex, Some(Rgb(9, 9, 9)), None).unwrap(),
            ],
        );
        colorizer.set_current_rule_set("custom");

        let event = LogEvent::new("a", Level::Info, "request timeout");
        assert_eq!(colorizer.foreground(&event), Some(Rgb::BLACK));
        assert_eq!(colorizer.background(&event), Some(Rgb(1, 2, 3)));

        assert!(colorizer.remove_rule("custom", "msg ~= time"));
        assert_eq!(colorizer.background(&event), Some(Rgb(9, 9, 9)));
        assert!(!colorizer.remove_rule("custom", "missing"));
    }

    #[test]
    fn test_unknown_rule_set_colors_nothing() {
        let colorizer = RuleColorizer::new();
        colorizer.set_current_rule_set("nope");
        assert_eq!(colorizer.background(&LogEvent::new("a", Level::Fatal, "")), None);
    }

    #[test]
    fn test_edits_notify_listeners() {
        let colorizer = RuleColorizer::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        colorizer
            .listeners()
            .add(move |name: &String| sink.lock().push(name.clone()));

        let rule = ColorRule::new("level == DEBUG", PatternSyntax::Regex, Some(Rgb::BLACK), None).unwrap();
        colorizer.add_rule("extra", rule);
        colorizer.set_current_rule_set("extra");

        assert_eq!(*seen.lock(), vec!["extra", "extra"]);
        assert_eq!(colorizer.rule_set_names(), vec!["Default", "extra"]);
    }

    #[test]
    fn test_rgb_hex_round_trip() {
        let color: Rgb = "#93160a".parse().unwrap();
        assert_eq!(color, Rgb(0x93, 0x16, 0x0a));
        assert_eq!(color.to_string(), "#93160a");
        assert!("#12345".parse::<Rgb>().is_err());
        assert!("zzzzzz".parse::<Rgb>().is_err());
    }
}
