/// Returns `s` unless it is blank, in which case `fallback`.
pub fn choose<'a>(s: &'a str, fallback: &'a str) -> &'a str {
    if s.trim().is_empty() {
        fallback
    } else {
        s
    }
}

pub fn head_n<T>(s: &[T], n: usize) -> &[T] {
    &s[..s.len().min(n)]
}

/// Reorders `names` so that names containing an earlier preference come first.
/// Names matching no preference keep their original relative order at the end.
pub fn prioritize(names: &[String], prefs: &[&str]) -> Vec<String> {
    let mut out = Vec::with_capacity(names.len());
    let mut seen = vec![false; names.len()];
    for p in prefs {
        for (i, n) in names.iter().enumerate() {
            if !seen[i] && n.to_lowercase().contains(p) {
                out.push(n.clone());
                seen[i] = true;
            }
        }
    }
    for (i, n) in names.iter().enumerate() {
        if !seen[i] {
            out.push(n.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn choose_falls_back_on_blank() {
        assert_eq!(choose("gpu", "*:*"), "gpu");
        assert_eq!(choose("  ", "*:*"), "*:*");
        assert_eq!(choose("", "*:*"), "*:*");
    }

    #[test]
    fn head_n_clamps() {
        let xs = [1, 2, 3];
        assert_eq!(head_n(&xs, 2), &[1, 2]);
        assert_eq!(head_n(&xs, 10), &[1, 2, 3]);
        assert!(head_n(&xs, 0).is_empty());
    }

    #[test]
    fn prioritize_orders_by_preference_then_input() {
        let out = prioritize(
            &names(&["body_txt", "Product_Name", "title_s", "misc"]),
            &["title", "name"],
        );
        assert_eq!(out, names(&["title_s", "Product_Name", "body_txt", "misc"]));
    }

    #[test]
    fn prioritize_empty_input() {
        assert!(prioritize(&[], &["title"]).is_empty());
    }
}
