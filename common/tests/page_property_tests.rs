// Property-based tests for page validation and the page tree

use chrono::Utc;
use common::models::{generate_share_code, Page, PageInput, GENERATED_SHARE_CODE_LENGTH};
use common::tree::{PageTree, TreeNode};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

fn page(id: i64, slug: &str, priority: f64) -> Page {
    Page {
        id,
        user_id: Uuid::nil(),
        last_updated: Utc::now(),
        slug: slug.to_string(),
        priority,
        title: format!("Title {}", id),
        public: false,
        edit_permission: false,
        share: false,
        share_edit_permission: false,
        share_code: None,
        text: None,
    }
}

fn slug_set() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set("[a-c]{1,2}(/[a-c]{1,2}){0,2}", 1..25)
}

fn pages_from(slugs: &BTreeSet<String>, priorities: &[f64]) -> Vec<Page> {
    slugs
        .iter()
        .enumerate()
        .map(|(i, slug)| page(i as i64 + 1, slug, priorities[i % priorities.len()]))
        .collect()
}

// Priority a node sorts by: its own page, or the smallest one below a placeholder
fn effective_priority(node: &TreeNode) -> f64 {
    match &node.page {
        Some(page) => page.priority,
        None => node
            .children
            .iter()
            .map(effective_priority)
            .fold(f64::INFINITY, f64::min),
    }
}

fn assert_siblings_sorted(nodes: &[TreeNode]) -> Result<(), TestCaseError> {
    for pair in nodes.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        let ordering = effective_priority(a)
            .total_cmp(&effective_priority(b))
            .then_with(|| a.segment.cmp(&b.segment));
        prop_assert!(
            ordering.is_lt(),
            "{} should sort before {}",
            a.path,
            b.path
        );
    }
    for node in nodes {
        assert_siblings_sorted(&node.children)?;
    }
    Ok(())
}

// For any set of slugs the pre-order walk lists every page exactly once
#[test]
fn property_tree_order_is_a_permutation() {
    proptest!(|(
        slugs in slug_set(),
        priorities in prop::collection::vec(-100.0f64..100.0, 1..10)
    )| {
        let pages = pages_from(&slugs, &priorities);
        let mut expected: Vec<i64> = pages.iter().map(|p| p.id).collect();

        let mut ordered: Vec<i64> = PageTree::ordered(pages).iter().map(|p| p.id).collect();
        prop_assert_eq!(ordered.len(), expected.len());

        ordered.sort_unstable();
        expected.sort_unstable();
        prop_assert_eq!(ordered, expected);
    });
}

// For any page whose ancestor slug is also a page, the ancestor comes first
#[test]
fn property_ancestors_precede_descendants() {
    proptest!(|(
        slugs in slug_set(),
        priorities in prop::collection::vec(-100.0f64..100.0, 1..10)
    )| {
        let pages = pages_from(&slugs, &priorities);
        let ordered = PageTree::ordered(pages);
        let position: HashMap<&str, usize> = ordered
            .iter()
            .enumerate()
            .map(|(i, p)| (p.slug.as_str(), i))
            .collect();

        for page in &ordered {
            let segments: Vec<&str> = page.slug.split('/').collect();
            for depth in 1..segments.len() {
                let ancestor = segments[..depth].join("/");
                if let Some(&ancestor_pos) = position.get(ancestor.as_str()) {
                    prop_assert!(ancestor_pos < position[page.slug.as_str()]);
                }
            }
        }
    });
}

// Siblings are ordered by priority, ties broken by segment name
#[test]
fn property_siblings_sorted_by_priority_then_segment() {
    proptest!(|(
        slugs in slug_set(),
        priorities in prop::collection::vec(-3i32..3, 1..10)
    )| {
        // Small integer priorities force plenty of ties
        let priorities: Vec<f64> = priorities.into_iter().map(f64::from).collect();
        let pages = pages_from(&slugs, &priorities);
        let tree = PageTree::build(&pages);
        assert_siblings_sorted(tree.roots())?;
    });
}

// Every node path is the parent path plus its own segment
#[test]
fn property_node_paths_match_slugs() {
    proptest!(|(slugs in slug_set())| {
        let pages = pages_from(&slugs, &[0.0]);
        let tree = PageTree::build(&pages);

        fn walk(nodes: &[TreeNode], parent: Option<&str>) -> Result<(), TestCaseError> {
            for node in nodes {
                let expected = match parent {
                    Some(parent) => format!("{}/{}", parent, node.segment),
                    None => node.segment.clone(),
                };
                prop_assert_eq!(&node.path, &expected);
                prop_assert!(!node.is_placeholder() || !node.children.is_empty());
                walk(&node.children, Some(node.path.as_str()))?;
            }
            Ok(())
        }
        walk(tree.roots(), None)?;
    });
}

// Edit permissions are only valid when the matching visibility is on
#[test]
fn property_permission_flags_validation() {
    proptest!(|(
        public in any::<bool>(),
        edit_permission in any::<bool>(),
        share in any::<bool>(),
        share_edit_permission in any::<bool>()
    )| {
        let input = PageInput {
            slug: "notes".to_string(),
            title: "Notes".to_string(),
            public,
            edit_permission,
            share,
            share_edit_permission,
            ..Default::default()
        };
        let consistent = (!edit_permission || public) && (!share_edit_permission || share);
        prop_assert_eq!(input.validate().is_ok(), consistent);
    });
}

// Slugs with an empty path segment are rejected
#[test]
fn property_empty_slug_segments_rejected() {
    proptest!(|(
        head in "[a-z]{1,10}",
        tail in "[a-z]{1,10}"
    )| {
        for slug in [
            format!("{}//{}", head, tail),
            format!("/{}", head),
            format!("{}/", head),
        ] {
            let input = PageInput {
                slug,
                title: "Title".to_string(),
                ..Default::default()
            };
            prop_assert!(input.validate().is_err());
        }

        let nested = PageInput {
            slug: format!("{}/{}", head, tail),
            title: "Title".to_string(),
            ..Default::default()
        };
        prop_assert!(nested.validate().is_ok());
    });
}

// Share codes must be alphanumeric
#[test]
fn property_share_code_charset() {
    proptest!(|(code in "[A-Za-z0-9]{1,64}", bad in "[A-Za-z0-9]{0,10}[-_ !/][A-Za-z0-9]{0,10}")| {
        let mut input = PageInput {
            slug: "page".to_string(),
            title: "Page".to_string(),
            share_code: Some(code),
            ..Default::default()
        };
        prop_assert!(input.validate().is_ok());

        input.share_code = Some(bad);
        prop_assert!(input.validate().is_err());
    });
}

#[test]
fn test_generated_share_codes_are_valid_and_distinct() {
    let codes: BTreeSet<String> = (0..50).map(|_| generate_share_code()).collect();
    assert_eq!(codes.len(), 50);
    for code in &codes {
        assert_eq!(code.len(), GENERATED_SHARE_CODE_LENGTH);
        let input = PageInput {
            slug: "page".to_string(),
            title: "Page".to_string(),
            share_code: Some(code.clone()),
            ..Default::default()
        };
        assert!(input.validate().is_ok());
    }
}
