/// Wildcard matching for method-selection patterns.
///
/// A pattern is a literal string in which `*` stands for zero or more
/// characters. Matching is case-sensitive and anchored to the full
/// qualified name; there is no substring/contains behavior. Everything
/// except `*` (including `.`) matches literally.
///
/// **Examples**
/// - `"process*"` matches `"processOrder"` but not `"svc.processOrder"`
///   only because of the extra prefix characters being consumed by the
///   literal part; `"*process*"` would match both.
/// - `"com.example.*Service.save*"` matches
///   `"com.example.OrderService.saveOrder"`.
pub fn matches(pattern: &str, name: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = name.chars().collect();

    // Iterative glob match with single-star backtracking.
    let mut p = 0;
    let mut t = 0;
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while t < txt.len() {
        if p < pat.len() && pat[p] == '*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if p < pat.len() && pat[p] == txt[t] {
            p += 1;
            t += 1;
        } else if let Some(s) = star {
            // Let the last `*` absorb one more character and retry.
            p = s + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }

    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }

    p == pat.len()
}

/// True if `name` matches any pattern in `patterns`.
pub fn matches_any<S: AsRef<str>>(patterns: &[S], name: &str) -> bool {
    patterns.iter().any(|p| matches(p.as_ref(), name))
}
