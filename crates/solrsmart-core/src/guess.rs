//! Field role classifier.
//!
//! Roles are looked up in declarative keyword tables: each role scans one
//! classification array of the catalog and takes the first field whose
//! lower-cased name contains any of the role's keywords. Tables carry Latin
//! and Japanese vocabularies since field names come in either.

use crate::model::{FieldCatalog, FieldKind, FieldName, GuessedFields};
use crate::util::{head_n, prioritize};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Price,
    Date,
    Brand,
    Category,
    InStock,
}

pub struct RoleRule {
    pub role: Role,
    pub kind: FieldKind,
    pub keywords: &'static [&'static str],
}

pub const ROLE_RULES: &[RoleRule] = &[
    RoleRule {
        role: Role::Price,
        kind: FieldKind::Numeric,
        keywords: &[
            "price", "cost", "amount", "fee", "tax", "salary", "budget", "金額", "価格", "値段",
            "料金",
        ],
    },
    RoleRule {
        role: Role::Date,
        kind: FieldKind::Date,
        keywords: &[
            "date", "time", "timestamp", "created", "updated", "modified", "release", "publish",
            "_dt", "_tdt", "日付", "日時", "時間", "登録", "更新",
        ],
    },
    RoleRule {
        role: Role::Brand,
        kind: FieldKind::Text,
        keywords: &[
            "brand", "maker", "manufacturer", "vendor", "supplier", "メーカー", "ブランド", "製造",
            "販売",
        ],
    },
    RoleRule {
        role: Role::Category,
        kind: FieldKind::Text,
        keywords: &[
            "category", "type", "genre", "class", "カテゴリ", "分類", "種類", "ジャンル",
        ],
    },
    RoleRule {
        role: Role::InStock,
        kind: FieldKind::Boolean,
        keywords: &["in_stock", "available", "stock", "在庫", "有無", "販売"],
    },
];

/// Preference order used to rank free-text fields; title/name-like first.
pub const TEXT_PRIORITY: &[&str] = &[
    "title", "name", "product", "item", "商品名", "説明", "description", "detail", "内容", "本文",
    "テキスト", "text",
];

pub const TEXT_TOP_N: usize = 3;

/// First name in `names` containing any keyword, case-insensitively.
pub fn find_by(names: &[FieldName], keywords: &[&str]) -> Option<FieldName> {
    names
        .iter()
        .find(|n| {
            let ln = n.to_lowercase();
            keywords.iter().any(|k| ln.contains(k))
        })
        .cloned()
}

pub fn guess_role(fc: &FieldCatalog, role: Role) -> FieldName {
    ROLE_RULES
        .iter()
        .find(|r| r.role == role)
        .and_then(|r| find_by(fc.names(r.kind), r.keywords))
        .unwrap_or_default()
}

/// Pure and deterministic: the same catalog always yields the same guesses.
pub fn guess_fields(fc: &FieldCatalog) -> GuessedFields {
    let mut prior = prioritize(&fc.texts, TEXT_PRIORITY);
    if prior.is_empty() {
        prior = fc.texts.clone();
    }
    GuessedFields {
        price: guess_role(fc, Role::Price),
        date: guess_role(fc, Role::Date),
        brand: guess_role(fc, Role::Brand),
        category: guess_role(fc, Role::Category),
        in_stock: guess_role(fc, Role::InStock),
        default_df: prior.first().cloned().unwrap_or_default(),
        text_top_n: head_n(&prior, TEXT_TOP_N).to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldDescriptor;

    fn catalog(fields: &[(&str, &str)]) -> FieldCatalog {
        FieldCatalog::new(
            "id",
            fields
                .iter()
                .map(|(n, t)| FieldDescriptor::new(*n, *t))
                .collect(),
            None,
        )
    }

    #[test]
    fn techproducts_guesses() {
        let fc = catalog(&[
            ("price_i", "pint"),
            ("release_dt", "pdate"),
            ("brand_s", "string"),
            ("title_txt", "text_general"),
        ]);
        let g = guess_fields(&fc);
        assert_eq!(g.price, "price_i");
        assert_eq!(g.date, "release_dt");
        assert_eq!(g.brand, "brand_s");
        assert_eq!(g.category, "");
        assert_eq!(g.in_stock, "");
        assert_eq!(g.default_df, "title_txt");
        assert_eq!(g.text_top_n, vec!["title_txt", "brand_s"]);
        assert_eq!(fc.guessed, g);
    }

    #[test]
    fn guessing_is_repeatable() {
        let fc = catalog(&[
            ("cat", "string"),
            ("product_type", "string"),
            ("inStock", "boolean"),
            ("cost_f", "pfloat"),
        ]);
        let a = guess_fields(&fc);
        let b = guess_fields(&fc);
        assert_eq!(a, b);
        assert_eq!(a.category, "product_type");
        assert_eq!(a.in_stock, "inStock");
        assert_eq!(a.price, "cost_f");
    }

    #[test]
    fn no_numeric_fields_means_no_price() {
        let fc = catalog(&[("title", "text_general"), ("price_label", "string")]);
        let g = guess_fields(&fc);
        assert_eq!(g.price, "");
        assert_eq!(g.default_df, "title");
    }

    #[test]
    fn first_match_in_array_order_wins() {
        let fc = catalog(&[("updated_at", "pdate"), ("created_at", "pdate")]);
        assert_eq!(guess_fields(&fc).date, "updated_at");
    }

    #[test]
    fn solr_date_suffixes_and_release_names() {
        let fc = catalog(&[("weight_f", "pfloat"), ("first_seen_tdt", "tdate")]);
        assert_eq!(guess_fields(&fc).date, "first_seen_tdt");
        let fc = catalog(&[("published_on", "pdate"), ("release_dt", "pdate")]);
        assert_eq!(guess_fields(&fc).date, "published_on");
    }

    #[test]
    fn japanese_field_names() {
        let fc = catalog(&[
            ("本文", "text_ja"),
            ("商品名", "text_ja"),
            ("価格", "pint"),
            ("メーカー", "string"),
            ("在庫あり", "boolean"),
            ("登録日", "pdate"),
        ]);
        let g = guess_fields(&fc);
        assert_eq!(g.price, "価格");
        assert_eq!(g.brand, "メーカー");
        assert_eq!(g.in_stock, "在庫あり");
        assert_eq!(g.date, "登録日");
        assert_eq!(g.default_df, "商品名");
        assert_eq!(g.text_top_n, vec!["商品名", "本文", "メーカー"]);
    }

    #[test]
    fn unmatched_text_fields_keep_input_order() {
        let fc = catalog(&[("zzz", "string"), ("aaa", "string")]);
        let g = guess_fields(&fc);
        assert_eq!(g.default_df, "zzz");
        assert_eq!(g.text_top_n, vec!["zzz", "aaa"]);
    }

    #[test]
    fn empty_catalog() {
        let g = guess_fields(&FieldCatalog::default());
        assert_eq!(g, GuessedFields::default());
    }

    #[test]
    fn every_role_has_a_rule() {
        for role in [
            Role::Price,
            Role::Date,
            Role::Brand,
            Role::Category,
            Role::InStock,
        ] {
            assert_eq!(ROLE_RULES.iter().filter(|r| r.role == role).count(), 1);
        }
    }
}
