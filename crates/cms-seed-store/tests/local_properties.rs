//! Property tests for the local document store.
//!
//! 1. **Key uniqueness**: under any mix of creates and updates, a natural
//!    key matches at most one document; duplicate creates are rejected.
//! 2. **Relation symmetry**: after any sequence of page/section connects, in
//!    either direction, `page.sections` and `section.page` agree and every
//!    section belongs to at most one page.
//! 3. **Publish convergence**: publishing makes the published revision equal
//!    the draft, and publishing an unchanged draft reports it as already
//!    published.

use std::collections::{BTreeMap, BTreeSet};

use cms_seed_store::{
    ContentStore, ContentType, DocumentId, KeyFilter, LocalOptions, LocalStore, PublishOutcome,
    Scope,
};
use proptest::prelude::*;
use serde_json::{Map, Value, json};

fn obj(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => unreachable!("object literal"),
    }
}

fn store() -> LocalStore {
    LocalStore::in_memory(LocalOptions::default())
}

fn by_slug(store: &LocalStore, slug: &str) -> Vec<cms_seed_store::Record> {
    store
        .find(ContentType::Page, Some(&KeyFilter::eq("slug", slug)), Scope::Draft, usize::MAX)
        .unwrap()
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum PageOp {
    Create { slug: String, title: String },
    Update { slug: String, title: String },
}

fn arb_page_op() -> impl Strategy<Value = PageOp> {
    let slug = prop::sample::select(vec!["home", "about", "pricing"]).prop_map(str::to_owned);
    let title = "[A-Z][a-z]{0,6}";
    prop_oneof![
        (slug.clone(), title).prop_map(|(slug, title)| PageOp::Create { slug, title }),
        (slug, title).prop_map(|(slug, title)| PageOp::Update { slug, title }),
    ]
}

/// `(page index, section index, forward)`.
fn arb_connects() -> impl Strategy<Value = Vec<(usize, usize, bool)>> {
    prop::collection::vec((0usize..3, 0usize..4, any::<bool>()), 0..12)
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn natural_keys_stay_unique(ops in prop::collection::vec(arb_page_op(), 1..20)) {
        let mut s = store();
        let mut expected: BTreeMap<String, String> = BTreeMap::new();

        for op in ops {
            match op {
                PageOp::Create { slug, title } => {
                    let result = s.create(ContentType::Page, &obj(json!({"slug": slug, "title": title})));
                    if expected.contains_key(&slug) {
                        prop_assert!(result.is_err(), "duplicate create of `{}` accepted", slug);
                    } else {
                        prop_assert!(result.is_ok());
                        expected.insert(slug, title);
                    }
                }
                PageOp::Update { slug, title } => {
                    let Some(existing) = by_slug(&s, &slug).pop() else { continue };
                    s.update(ContentType::Page, &existing.document_id, &obj(json!({"title": title})))
                        .unwrap();
                    expected.insert(slug, title);
                }
            }
        }

        prop_assert_eq!(s.document_count(ContentType::Page), expected.len());
        for (slug, title) in &expected {
            let found = by_slug(&s, slug);
            prop_assert_eq!(found.len(), 1);
            prop_assert_eq!(found[0].str_field("title"), Some(title.as_str()));
        }
    }

    #[test]
    fn page_and_section_sides_agree(connects in arb_connects()) {
        let mut s = store();
        let pages: Vec<DocumentId> = (0..3)
            .map(|i| s.create(ContentType::Page, &obj(json!({"slug": format!("p{i}")}))).unwrap().document_id)
            .collect();
        let sections: Vec<DocumentId> = (0..4)
            .map(|i| s.create(ContentType::Section, &obj(json!({"anchor": format!("s{i}")}))).unwrap().document_id)
            .collect();

        for (p, sec, forward) in connects {
            if forward {
                s.connect(ContentType::Section, &sections[sec], "page", &[pages[p].clone()]).unwrap();
            } else {
                s.connect(ContentType::Page, &pages[p], "sections", &[sections[sec].clone()]).unwrap();
            }
        }

        let mut owner: BTreeMap<String, String> = BTreeMap::new();
        for page in s.find(ContentType::Page, None, Scope::Draft, usize::MAX).unwrap() {
            let ids = page.relation_ids("sections").unwrap_or_default();
            let distinct: BTreeSet<&String> = ids.iter().collect();
            prop_assert_eq!(distinct.len(), ids.len(), "duplicate section ids on a page");
            for id in ids {
                let previous = owner.insert(id.clone(), page.document_id.to_string());
                prop_assert!(previous.is_none(), "section {} listed on two pages", id);
            }
        }
        for section in s.find(ContentType::Section, None, Scope::Draft, usize::MAX).unwrap() {
            let page = section.relation_ids("page").unwrap_or_default();
            let listed = owner.get(section.document_id.as_str());
            prop_assert_eq!(page.first(), listed);
        }
    }

    #[test]
    fn publish_converges(titles in prop::collection::vec("[a-z]{1,8}", 1..5)) {
        let mut s = store();
        let page = s.create(ContentType::Page, &obj(json!({"slug": "home", "title": "start"}))).unwrap();

        for title in &titles {
            s.update(ContentType::Page, &page.document_id, &obj(json!({"title": title}))).unwrap();
            s.publish(ContentType::Page, &page.document_id).unwrap();

            let filter = KeyFilter::eq("slug", "home");
            let draft = s.find(ContentType::Page, Some(&filter), Scope::Draft, 1).unwrap();
            let published = s.find(ContentType::Page, Some(&filter), Scope::Published, 1).unwrap();
            prop_assert_eq!(&draft[0].fields, &published[0].fields);
            prop_assert_eq!(published[0].str_field("title"), Some(title.as_str()));
        }

        prop_assert_eq!(
            s.publish(ContentType::Page, &page.document_id).unwrap(),
            PublishOutcome::AlreadyPublished
        );
    }
}
