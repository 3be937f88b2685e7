use crate::competitor::Category;
use crate::error::VoteError;

/// Maximum number of competitors selectable per category.
pub const SELECTION_LIMIT: usize = 2;

/// Outcome of a single toggle intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Selected,
    Deselected,
}

/// Capacity-bounded set of competitor ids, kept in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: Vec<String>,
}

impl SelectionSet {
    pub fn contains(&self, competitor_id: &str) -> bool {
        self.ids.iter().any(|id| id == competitor_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ids.len() >= SELECTION_LIMIT
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Removal always succeeds; insertion returns `None` when the set is full.
    fn toggle(&mut self, competitor_id: &str) -> Option<Toggle> {
        if let Some(pos) = self.ids.iter().position(|id| id == competitor_id) {
            self.ids.remove(pos);
            return Some(Toggle::Deselected);
        }

        if self.is_full() {
            return None;
        }

        self.ids.push(competitor_id.to_string());
        Some(Toggle::Selected)
    }
}

/// Pending selections for both categories.
///
/// The two sets are independent: a competitor may be picked for flavor and looks at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selections {
    flavor: SelectionSet,
    looks: SelectionSet,
}

impl Selections {
    pub fn get(&self, category: Category) -> &SelectionSet {
        match category {
            Category::Flavor => &self.flavor,
            Category::Looks => &self.looks,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut SelectionSet {
        match category {
            Category::Flavor => &mut self.flavor,
            Category::Looks => &mut self.looks,
        }
    }

    pub fn toggle(&mut self, competitor_id: &str, category: Category) -> Result<Toggle, VoteError> {
        self.get_mut(category)
            .toggle(competitor_id)
            .ok_or(VoteError::SelectionLimitExceeded {
                category,
                limit: SELECTION_LIMIT,
            })
    }

    pub fn is_selected(&self, competitor_id: &str, category: Category) -> bool {
        self.get(category).contains(competitor_id)
    }

    pub fn is_selected_any(&self, competitor_id: &str) -> bool {
        Category::ALL
            .iter()
            .any(|category| self.is_selected(competitor_id, *category))
    }

    /// Both categories hold exactly `SELECTION_LIMIT` ids
    pub fn is_complete(&self) -> bool {
        self.flavor.len() == SELECTION_LIMIT && self.looks.len() == SELECTION_LIMIT
    }

    pub fn clear(&mut self) {
        self.flavor.clear();
        self.looks.clear();
    }
}
