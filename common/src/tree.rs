// Page hierarchy built from slash-separated slugs

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::models::{Page, User};

/// Page data carried by a tree node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageRef {
    pub id: i64,
    pub title: String,
    pub priority: f64,
    pub public: bool,
}

impl From<&Page> for PageRef {
    fn from(page: &Page) -> Self {
        Self {
            id: page.id,
            title: page.title.clone(),
            priority: page.priority,
            public: page.public,
        }
    }
}

/// One path segment; `page` is `None` for placeholder nodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub segment: String,
    /// Full slug of this node
    pub path: String,
    pub page: Option<PageRef>,
    pub children: Vec<TreeNode>,
    #[serde(skip)]
    sort_priority: f64,
}

impl TreeNode {
    pub fn is_placeholder(&self) -> bool {
        self.page.is_none()
    }

    fn collect_ids(&self, out: &mut Vec<i64>) {
        if let Some(page) = &self.page {
            out.push(page.id);
        }
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

#[derive(Default)]
struct NodeBuilder {
    page: Option<PageRef>,
    children: BTreeMap<String, NodeBuilder>,
}

impl NodeBuilder {
    fn insert(&mut self, segments: &[&str], page: PageRef) {
        match segments.split_first() {
            None => self.page = Some(page),
            Some((head, rest)) => self
                .children
                .entry((*head).to_string())
                .or_default()
                .insert(rest, page),
        }
    }

    fn finish(self, segment: String, path: String) -> TreeNode {
        let children = finish_children(self.children, Some(path.as_str()));
        // Placeholders sort by the smallest priority found below them
        let sort_priority = match &self.page {
            Some(page) => page.priority,
            None => children
                .iter()
                .map(|c| c.sort_priority)
                .fold(f64::INFINITY, f64::min),
        };
        TreeNode {
            segment,
            path,
            page: self.page,
            children,
            sort_priority,
        }
    }
}

fn finish_children(children: BTreeMap<String, NodeBuilder>, parent: Option<&str>) -> Vec<TreeNode> {
    let mut nodes: Vec<TreeNode> = children
        .into_iter()
        .map(|(segment, builder)| {
            let path = match parent {
                Some(parent) => format!("{}/{}", parent, segment),
                None => segment.clone(),
            };
            builder.finish(segment, path)
        })
        .collect();
    nodes.sort_by(compare_siblings);
    nodes
}

fn compare_siblings(a: &TreeNode, b: &TreeNode) -> Ordering {
    a.sort_priority
        .total_cmp(&b.sort_priority)
        .then_with(|| a.segment.cmp(&b.segment))
}

/// Forest of pages keyed by slug path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PageTree {
    roots: Vec<TreeNode>,
}

impl PageTree {
    /// Build the forest; missing intermediate paths become placeholders
    pub fn build<'a>(pages: impl IntoIterator<Item = &'a Page>) -> Self {
        let mut root = NodeBuilder::default();
        for page in pages {
            let segments: Vec<&str> = page.slug.split('/').filter(|s| !s.is_empty()).collect();
            if segments.is_empty() {
                continue;
            }
            root.insert(&segments, PageRef::from(page));
        }
        Self {
            roots: finish_children(root.children, None),
        }
    }

    pub fn roots(&self) -> &[TreeNode] {
        &self.roots
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Page ids in pre-order, placeholders skipped
    pub fn ordered_ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        for node in &self.roots {
            node.collect_ids(&mut ids);
        }
        ids
    }

    /// Reorder `pages` to match the tree's pre-order walk
    pub fn ordered(pages: Vec<Page>) -> Vec<Page> {
        let order = Self::build(&pages).ordered_ids();
        let mut by_id: HashMap<i64, Page> = pages.into_iter().map(|p| (p.id, p)).collect();
        order.into_iter().filter_map(|id| by_id.remove(&id)).collect()
    }
}

/// Navigation tree of one owner's pages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavTree {
    pub username: String,
    pub is_own: bool,
    pub tree: PageTree,
}

/// Group visible pages per owner: the viewer's own tree first, then others alphabetically
pub fn build_nav_trees(viewer: Option<&User>, owners: &[User], pages: &[Page]) -> Vec<NavTree> {
    let usernames: HashMap<Uuid, &str> = owners
        .iter()
        .map(|u| (u.id, u.username.as_str()))
        .collect();

    let mut grouped: HashMap<Uuid, Vec<&Page>> = HashMap::new();
    for page in pages {
        grouped.entry(page.user_id).or_default().push(page);
    }

    let viewer_id = viewer.map(|u| u.id);
    let mut trees: Vec<NavTree> = grouped
        .into_iter()
        .filter_map(|(owner, owned)| {
            let username = usernames.get(&owner)?;
            Some(NavTree {
                username: (*username).to_string(),
                is_own: Some(owner) == viewer_id,
                tree: PageTree::build(owned),
            })
        })
        .collect();

    trees.sort_by(|a, b| {
        b.is_own
            .cmp(&a.is_own)
            .then_with(|| a.username.cmp(&b.username))
    });
    trees
}
