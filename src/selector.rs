use crate::config::{LoggingConfig, MethodSelectionConfig};
use crate::pattern;

/// Immutable rule set deciding which qualified names are observed.
///
/// Built once at startup (including the one-time merge of class-level
/// declarative patterns) and read concurrently without locking afterwards.
#[derive(Debug, Clone, Default)]
pub struct MethodSelectionRules {
    pub include_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub include_classes: Vec<String>,
    pub include_packages: Vec<String>,
}

/// Pure query over the frozen rule state: `is_observable` decides whether
/// a `package.Class.method` name is logged.
#[derive(Debug, Clone, Default)]
pub struct MethodSelector {
    rules: MethodSelectionRules,
    /// Legacy flat pattern list, consulted only when the rule set yields
    /// no verdict.
    predefined_patterns: Vec<String>,
}

impl MethodSelector {
    pub fn builder() -> MethodSelectorBuilder {
        MethodSelectorBuilder::default()
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        MethodSelector::builder()
            .selection(&config.method_selection)
            .predefined_patterns(&config.predefined_methods)
            .build()
    }

    pub fn rules(&self) -> &MethodSelectionRules {
        &self.rules
    }

    /// Decide whether `qualified_name` (`package.Class.method`) should be
    /// observed. Evaluation order is load-bearing:
    ///
    /// 1. exclude patterns (short-circuit, exclusion always wins)
    /// 2. include patterns
    /// 3. exact class inclusion
    /// 4. package-prefix inclusion
    /// 5. legacy predefined patterns
    ///
    /// Default-closed: nothing is logged unless explicitly selected.
    pub fn is_observable(&self, qualified_name: &str) -> bool {
        if any_applies(&self.rules.exclude_patterns, qualified_name) {
            return false;
        }
        if any_applies(&self.rules.include_patterns, qualified_name) {
            return true;
        }

        let class = class_of(qualified_name);
        if self.rules.include_classes.iter().any(|c| c == class) {
            return true;
        }
        if self.rules.include_packages.iter().any(|p| class.starts_with(p.as_str())) {
            return true;
        }

        any_applies(&self.predefined_patterns, qualified_name)
    }
}

/// A pattern containing a `.` targets the whole qualified name; a
/// dot-free pattern targets the bare method name (the part after the
/// last `.`). Both are anchored matches.
fn pattern_applies(p: &str, qualified_name: &str) -> bool {
    if p.contains('.') {
        pattern::matches(p, qualified_name)
    } else {
        pattern::matches(p, method_of(qualified_name))
    }
}

fn any_applies(patterns: &[String], qualified_name: &str) -> bool {
    patterns.iter().any(|p| pattern_applies(p, qualified_name))
}

/// The method part of a qualified name: everything after the last `.`.
pub fn method_of(qualified_name: &str) -> &str {
    match qualified_name.rfind('.') {
        Some(idx) => &qualified_name[idx + 1..],
        None => qualified_name,
    }
}

/// The class part of a qualified name: everything before the last `.`.
pub fn class_of(qualified_name: &str) -> &str {
    match qualified_name.rfind('.') {
        Some(idx) => &qualified_name[..idx],
        None => "",
    }
}

/// One-time assembly of the rule set. Class-level declarative patterns
/// (the replacement for runtime annotation scanning) are merged here,
/// before any call is intercepted; `build` freezes the result.
#[derive(Debug, Default)]
pub struct MethodSelectorBuilder {
    rules: MethodSelectionRules,
    predefined_patterns: Vec<String>,
}

impl MethodSelectorBuilder {
    pub fn selection(mut self, config: &MethodSelectionConfig) -> Self {
        self.rules
            .include_patterns
            .extend(config.include_patterns.iter().cloned());
        self.rules
            .exclude_patterns
            .extend(config.exclude_patterns.iter().cloned());
        self.rules
            .include_classes
            .extend(config.include_classes.iter().cloned());
        self.rules
            .include_packages
            .extend(config.include_packages.iter().cloned());
        self
    }

    pub fn include_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.rules.include_patterns.push(pattern.into());
        self
    }

    pub fn exclude_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.rules.exclude_patterns.push(pattern.into());
        self
    }

    pub fn predefined_patterns<S: AsRef<str>>(mut self, patterns: &[S]) -> Self {
        self.predefined_patterns
            .extend(patterns.iter().map(|p| p.as_ref().to_string()));
        self
    }

    /// Merge method patterns declared against a single class into the
    /// qualified include/exclude lists, e.g. class `svc.OrderService`
    /// with include `process*` yields `svc.OrderService.process*`.
    pub fn merge_class_patterns<S: AsRef<str>>(
        mut self,
        class: &str,
        include: &[S],
        exclude: &[S],
    ) -> Self {
        for p in include {
            self.rules
                .include_patterns
                .push(format!("{class}.{}", p.as_ref()));
        }
        for p in exclude {
            self.rules
                .exclude_patterns
                .push(format!("{class}.{}", p.as_ref()));
        }
        self
    }

    pub fn build(self) -> MethodSelector {
        MethodSelector {
            rules: self.rules,
            predefined_patterns: self.predefined_patterns,
        }
    }
}
