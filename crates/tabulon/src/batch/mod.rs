//! Run-length partitioning of keyed lookups.
//!
//! Retrieving many distinct rows from one partition is cheapest as a single
//! query whose filter OR-combines one row-key condition per row. The backend
//! caps both the query string's length and, more restrictively, the number of
//! nested conditions it will parse. This module splits an ordered key
//! sequence into the groups that fit those caps, one query per group.

/// One contiguous group of a partitioned sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunGroup<T> {
    /// Zero-based group number; indices are contiguous and increasing.
    pub index: usize,
    /// The elements assigned to this group, in input order.
    pub items: Vec<T>,
}

/// Partitions `items` into ordered groups bounded by a cumulative cost and an
/// element count.
///
/// Each element's cost is taken from `cost`. A group accepts elements until
/// either the summed cost would exceed `max_length` or the group holds
/// `max_elements` elements; the next element then opens a fresh group with
/// full budgets. This never fails: an element whose own cost exceeds
/// `max_length` becomes a group of its own, without disturbing the budgets of
/// the group that follows it.
///
/// Concatenating the returned groups in order reproduces `items` exactly.
///
/// # Example
///
/// ```
/// use tabulon::group_by_running_length;
///
/// let keys = ["ab", "cde", "fg"];
/// let groups = group_by_running_length(keys, 5, 100, |key| key.len());
///
/// assert_eq!(groups.len(), 2);
/// assert_eq!(groups[0].items, vec!["ab", "cde"]);
/// assert_eq!(groups[1].items, vec!["fg"]);
/// ```
pub fn group_by_running_length<T, F>(
    items: impl IntoIterator<Item = T>,
    max_length: usize,
    max_elements: usize,
    mut cost: F,
) -> Vec<RunGroup<T>>
where
    F: FnMut(&T) -> usize,
{
    let mut partitioner = RunLengthPartitioner::new(max_length, max_elements);
    let mut groups: Vec<RunGroup<T>> = Vec::new();

    for item in items {
        let index = partitioner.assign(cost(&item));
        match groups.last_mut() {
            Some(group) if group.index == index => group.items.push(item),
            _ => groups.push(RunGroup {
                index,
                items: vec![item],
            }),
        }
    }

    groups
}

/// The stateful core of [`group_by_running_length`]: maps a stream of element
/// costs to group indices.
///
/// Exposed separately so the assignment policy can be exercised without
/// materializing groups.
#[derive(Debug)]
pub struct RunLengthPartitioner {
    max_length: usize,
    max_elements: usize,
    remaining_length: usize,
    remaining_elements: usize,
    current: usize,
    current_has_items: bool,
}

impl RunLengthPartitioner {
    /// A `max_elements` of zero is treated as one; a group always holds at
    /// least one element.
    pub fn new(max_length: usize, max_elements: usize) -> Self {
        let max_elements = max_elements.max(1);
        Self {
            max_length,
            max_elements,
            remaining_length: max_length,
            remaining_elements: max_elements,
            current: 0,
            current_has_items: false,
        }
    }

    /// Assigns the next element, of cost `length`, to a group.
    ///
    /// Returned indices never decrease, and never skip except past a
    /// completed oversized singleton.
    pub fn assign(&mut self, length: usize) -> usize {
        if self.remaining_elements == 0 {
            // The element budget closed the group. The next group starts with
            // a fresh length budget; the triggering element's length is not
            // charged against it (the element cap, not the length, was the
            // binding constraint).
            self.current += 1;
            self.remaining_length = self.max_length;
            self.remaining_elements = self.max_elements - 1;
            self.current_has_items = true;
            return self.current;
        }

        if length > self.max_length {
            // Oversized: the element can never share a group. Claim the
            // current group if nothing has been assigned to it yet, otherwise
            // take the next index. Either way the group after the singleton
            // starts with full budgets.
            let index = if self.current_has_items {
                self.current + 1
            } else {
                self.current
            };
            self.current = index + 1;
            self.remaining_length = self.max_length;
            self.remaining_elements = self.max_elements;
            self.current_has_items = false;
            return index;
        }

        if length <= self.remaining_length {
            self.remaining_length -= length;
            self.remaining_elements -= 1;
            self.current_has_items = true;
            return self.current;
        }

        // Fits within the maximum on its own, just not in what is left of the
        // current group.
        self.current += 1;
        self.remaining_length = self.max_length - length;
        self.remaining_elements = self.max_elements - 1;
        self.current_has_items = true;
        self.current
    }
}
