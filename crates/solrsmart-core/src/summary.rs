use crate::model::{FieldCatalog, FieldName};
use crate::util::head_n;
use std::fmt::Write;

/// Maximum names listed per classification line.
pub const SUMMARY_FIELDS_PER_KIND: usize = 30;

/// Plain-text schema summary handed to the plan source.
pub fn summarize_schema(fc: &FieldCatalog) -> String {
    let mut sb = String::new();
    let _ = writeln!(sb, "uniqueKey={}", fc.unique_key);
    let mut write_kind = |tag: &str, names: &[FieldName]| {
        if names.is_empty() {
            return;
        }
        let described: Vec<String> = head_n(names, SUMMARY_FIELDS_PER_KIND)
            .iter()
            .map(|n| match fc.description(n) {
                Some(d) => format!("{n}({d})"),
                None => n.clone(),
            })
            .collect();
        let _ = writeln!(sb, "{tag}: {}", described.join(", "));
    };
    write_kind("text_fields", &fc.texts);
    write_kind("number_fields", &fc.numbers);
    write_kind("date_fields", &fc.dates);
    write_kind("bool_fields", &fc.bools);

    let g = &fc.guessed;
    for (tag, value) in [
        ("price", &g.price),
        ("date", &g.date),
        ("brand", &g.brand),
        ("category", &g.category),
        ("inStock", &g.in_stock),
        ("defaultDF", &g.default_df),
    ] {
        if !value.is_empty() {
            let _ = writeln!(sb, "guess.{tag}={value}");
        }
    }
    sb
}
