use std::collections::VecDeque;

pub type List = VecDeque<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    Left,
    Right,
}

impl ListEnd {
    /// The non-blocking command that removes from this end.
    pub fn pop_command(&self) -> &'static str {
        match self {
            ListEnd::Left => "LPOP",
            ListEnd::Right => "RPOP",
        }
    }
}

/// Pushes `values` one by one, so a left push of `a b c` leaves `c` at the head.
/// Returns the new length.
pub fn push<I>(list: &mut List, end: ListEnd, values: I) -> usize
where
    I: IntoIterator<Item = String>,
{
    for value in values {
        match end {
            ListEnd::Left => list.push_front(value),
            ListEnd::Right => list.push_back(value),
        }
    }

    list.len()
}

pub fn pop_one(list: &mut List, end: ListEnd) -> Option<String> {
    match end {
        ListEnd::Left => list.pop_front(),
        ListEnd::Right => list.pop_back(),
    }
}

/// Removes up to `count` elements from `end`, in pop order.
pub fn pop(list: &mut List, end: ListEnd, count: usize) -> Vec<String> {
    let available = count.min(list.len());
    let mut popped = Vec::with_capacity(available);

    while popped.len() < available {
        match pop_one(list, end) {
            Some(value) => popped.push(value),
            None => break,
        }
    }

    popped
}

/// Puts back a value taken with [`pop_one`].
pub fn restore(list: &mut List, end: ListEnd, value: String) {
    match end {
        ListEnd::Left => list.push_front(value),
        ListEnd::Right => list.push_back(value),
    }
}

/// Converts inclusive, possibly negative, indexes into bounds within `len`.
///
/// Negative indexes count from the end. `None` means the range selects nothing.
pub fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;

    if len == 0 {
        return None;
    }

    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len {
        return None;
    }

    Some((start as usize, stop as usize))
}

pub fn range(list: &List, start: isize, stop: isize) -> Vec<String> {
    match resolve_range(list.len(), start, stop) {
        Some((start, stop)) => list.range(start..=stop).cloned().collect(),
        None => Vec::new(),
    }
}
