//! Inline menus independent of the Telegram types: pagination, buttons and callback payloads.

pub const ITEMS_PER_PAGE: usize = 6;

/// What a button asks the bot to do. Indices point into the user's live session listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Open(usize),
    Page(usize),
    Up,
    Delete(usize),
    SubsPage(usize),
}

impl CallbackAction {
    pub fn encode(&self) -> String {
        match self {
            Self::Open(i) => format!("open:{i}"),
            Self::Page(p) => format!("page:{p}"),
            Self::Up => "up".to_string(),
            Self::Delete(i) => format!("del:{i}"),
            Self::SubsPage(p) => format!("subs:{p}"),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        if data == "up" {
            return Some(Self::Up);
        }
        let (kind, value) = data.split_once(':')?;
        let value: usize = value.parse().ok()?;
        match kind {
            "open" => Some(Self::Open(value)),
            "page" => Some(Self::Page(value)),
            "del" => Some(Self::Delete(value)),
            "subs" => Some(Self::SubsPage(value)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: CallbackAction,
}

impl Button {
    pub fn new(label: impl Into<String>, action: CallbackAction) -> Self {
        Self { label: label.into(), action }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    pub text: String,
    pub rows: Vec<Vec<Button>>,
}

/// One page of a listing. `offset` is the absolute index of `items[0]`.
#[derive(Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub offset: usize,
    pub page: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

pub fn page_count(len: usize) -> usize {
    len.div_ceil(ITEMS_PER_PAGE).max(1)
}

/// Slices out `page` (0-based), clamped to the last page.
pub fn paginate<T>(items: &[T], page: usize) -> Page<'_, T> {
    let page = page.min(page_count(items.len()) - 1);
    let offset = page * ITEMS_PER_PAGE;
    let end = (offset + ITEMS_PER_PAGE).min(items.len());
    Page {
        items: &items[offset..end],
        offset,
        page,
        has_prev: page > 0,
        has_next: end < items.len(),
    }
}

/// Previous/next buttons for a page, empty when there is only one page.
pub fn nav_row<T>(page: &Page<'_, T>, to_page: fn(usize) -> CallbackAction) -> Vec<Button> {
    let mut row = Vec::new();
    if page.has_prev {
        row.push(Button::new("⬅️ Back", to_page(page.page - 1)));
    }
    if page.has_next {
        row.push(Button::new("➡️ Next", to_page(page.page + 1)));
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_payloads_parse_back() {
        for action in [
            CallbackAction::Open(0),
            CallbackAction::Page(12),
            CallbackAction::Up,
            CallbackAction::Delete(5),
            CallbackAction::SubsPage(1),
        ] {
            let data = action.encode();
            assert!(data.len() <= 64);
            assert_eq!(CallbackAction::parse(&data), Some(action));
        }
    }

    #[test]
    fn rejects_unknown_payloads() {
        assert_eq!(CallbackAction::parse("proj:abcdef"), None);
        assert_eq!(CallbackAction::parse("open:-1"), None);
        assert_eq!(CallbackAction::parse("open"), None);
        assert_eq!(CallbackAction::parse(""), None);
    }

    #[test]
    fn paginates_with_boundaries() {
        let items: Vec<u32> = (0..13).collect();
        assert_eq!(page_count(items.len()), 3);

        let first = paginate(&items, 0);
        assert_eq!(first.items, &items[0..6]);
        assert!(!first.has_prev && first.has_next);

        let last = paginate(&items, 2);
        assert_eq!(last.items, &[12u32][..]);
        assert_eq!(last.offset, 12);
        assert!(last.has_prev && !last.has_next);

        let clamped = paginate(&items, 9);
        assert_eq!(clamped.page, 2);
    }

    #[test]
    fn exact_multiple_has_no_trailing_page() {
        let items: Vec<u32> = (0..6).collect();
        let page = paginate(&items, 0);
        assert!(!page.has_next);
        assert!(nav_row(&page, CallbackAction::Page).is_empty());
    }

    #[test]
    fn empty_listing_is_one_empty_page() {
        let items: Vec<u32> = Vec::new();
        let page = paginate(&items, 3);
        assert_eq!(page.page, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn nav_row_points_at_neighbours() {
        let items: Vec<u32> = (0..20).collect();
        let page = paginate(&items, 1);
        let row = nav_row(&page, CallbackAction::SubsPage);
        assert_eq!(row.len(), 2);
        assert_eq!(row[0].action, CallbackAction::SubsPage(0));
        assert_eq!(row[1].action, CallbackAction::SubsPage(2));
    }
}
