//! Offset/length views over shared action storage.
//!
//! A segment never owns its values. Several segments may point into the same
//! backing vector, so a write through one is visible through every other view
//! covering the same index.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::error;

use super::action_spec::ActionSpec;

/// Element types that can live in an action segment.
pub trait ActionValue: Copy + Default + PartialEq + fmt::Debug + 'static {
    /// Per-thread backing shared by every empty segment of this type.
    fn empty_backing() -> Rc<RefCell<Vec<Self>>>;
}

thread_local! {
    static EMPTY_CONTINUOUS: Rc<RefCell<Vec<f32>>> = Rc::new(RefCell::new(Vec::new()));
    static EMPTY_DISCRETE: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));
}

impl ActionValue for f32 {
    fn empty_backing() -> Rc<RefCell<Vec<Self>>> {
        EMPTY_CONTINUOUS.with(Rc::clone)
    }
}

impl ActionValue for i32 {
    fn empty_backing() -> Rc<RefCell<Vec<Self>>> {
        EMPTY_DISCRETE.with(Rc::clone)
    }
}

#[derive(Clone)]
pub struct ActionSegment<T: ActionValue> {
    backing: Rc<RefCell<Vec<T>>>,
    offset: usize,
    length: usize,
}

impl<T: ActionValue> ActionSegment<T> {
    /// View over the whole backing vector.
    pub fn new(backing: Rc<RefCell<Vec<T>>>) -> Self {
        let length = backing.borrow().len();
        ActionSegment {
            backing,
            offset: 0,
            length,
        }
    }

    /// View over `[offset, offset + length)` of the backing vector.
    pub fn with_range(backing: Rc<RefCell<Vec<T>>>, offset: usize, length: usize) -> Self {
        let available = backing.borrow().len();
        if offset + length > available {
            error!(
                "Segment [{}, {}) exceeds backing length {}",
                offset,
                offset + length,
                available
            );
        }
        ActionSegment {
            backing,
            offset,
            length,
        }
    }

    pub fn from_vec(values: Vec<T>) -> Self {
        Self::new(Rc::new(RefCell::new(values)))
    }

    pub fn zeroed(length: usize) -> Self {
        Self::from_vec(vec![T::default(); length])
    }

    pub fn empty() -> Self {
        ActionSegment {
            backing: T::empty_backing(),
            offset: 0,
            length: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Another view over `[start, start + length)` of this segment, sharing the backing.
    pub fn sub_segment(&self, start: usize, length: usize) -> Self {
        if start + length > self.length {
            error!(
                "Sub segment [{}, {}) exceeds segment length {}",
                start,
                start + length,
                self.length
            );
        }
        Self::with_range(Rc::clone(&self.backing), self.offset + start, length)
    }

    fn physical_index(&self, index: usize) -> Option<usize> {
        let physical = self.offset + index;
        if index < self.length && physical < self.backing.borrow().len() {
            Some(physical)
        } else {
            None
        }
    }

    /// Reads a value, returning the default on an out of range index.
    pub fn get(&self, index: usize) -> T {
        match self.physical_index(index) {
            Some(physical) => self.backing.borrow()[physical],
            None => {
                error!("Index {} out of bounds for segment of length {}", index, self.length);
                T::default()
            }
        }
    }

    /// Writes a value, ignoring out of range indices.
    pub fn set(&self, index: usize, value: T) {
        match self.physical_index(index) {
            Some(physical) => self.backing.borrow_mut()[physical] = value,
            None => {
                error!("Index {} out of bounds for segment of length {}", index, self.length);
            }
        }
    }

    fn valid_range(&self) -> std::ops::Range<usize> {
        let available = self.backing.borrow().len();
        let start = self.offset.min(available);
        let end = (self.offset + self.length).min(available);
        start..end
    }

    /// Zero-fills the covered range in place.
    pub fn clear(&self) {
        let range = self.valid_range();
        self.backing.borrow_mut()[range].fill(T::default());
    }

    pub fn to_vec(&self) -> Vec<T> {
        let range = self.valid_range();
        self.backing.borrow()[range].to_vec()
    }

    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        let range = self.valid_range();
        f(&self.backing.borrow()[range])
    }

    /// Overwrites the covered range with `values`. Lengths must match.
    pub fn copy_from_slice(&self, values: &[T]) -> bool {
        if values.len() != self.length {
            error!(
                "Cannot copy {} values into segment of length {}",
                values.len(),
                self.length
            );
            return false;
        }
        let range = self.valid_range();
        if range.len() != self.length {
            return false;
        }
        self.backing.borrow_mut()[range].copy_from_slice(values);
        true
    }

    /// Copies the contents of `source` into this segment. Lengths must match.
    pub fn copy_from(&self, source: &ActionSegment<T>) -> bool {
        if source.length != self.length {
            error!(
                "Cannot copy segment of length {} into segment of length {}",
                source.length, self.length
            );
            return false;
        }
        if Rc::ptr_eq(&self.backing, &source.backing) {
            let src = source.valid_range();
            if src.len() != self.length || self.valid_range().len() != self.length {
                return false;
            }
            self.backing.borrow_mut().copy_within(src, self.offset);
            return true;
        }
        source.with_slice(|values| self.copy_from_slice(values))
    }
}

impl<T: ActionValue> Default for ActionSegment<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Two segments are equal when they are the same view over the same storage.
impl<T: ActionValue> PartialEq for ActionSegment<T> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
            && self.length == other.length
            && Rc::ptr_eq(&self.backing, &other.backing)
    }
}

impl<T: ActionValue> fmt::Debug for ActionSegment<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter
            .debug_struct("ActionSegment")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("values", &self.to_vec())
            .finish()
    }
}

/// Continuous and discrete actions for one agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionBuffers {
    pub continuous_actions: ActionSegment<f32>,
    pub discrete_actions: ActionSegment<i32>,
}

impl ActionBuffers {
    pub fn new(
        continuous_actions: ActionSegment<f32>,
        discrete_actions: ActionSegment<i32>,
    ) -> Self {
        ActionBuffers {
            continuous_actions,
            discrete_actions,
        }
    }

    pub fn empty() -> Self {
        Self::new(ActionSegment::empty(), ActionSegment::empty())
    }

    pub fn zeroed(num_continuous_actions: usize, num_discrete_actions: usize) -> Self {
        Self::new(
            ActionSegment::zeroed(num_continuous_actions),
            ActionSegment::zeroed(num_discrete_actions),
        )
    }

    pub fn from_spec(spec: &ActionSpec) -> Self {
        Self::zeroed(spec.num_continuous_actions, spec.num_discrete_actions())
    }

    pub fn from_vecs(continuous: Vec<f32>, discrete: Vec<i32>) -> Self {
        Self::new(ActionSegment::from_vec(continuous), ActionSegment::from_vec(discrete))
    }

    pub fn clear(&self) {
        self.continuous_actions.clear();
        self.discrete_actions.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.continuous_actions.is_empty() && self.discrete_actions.is_empty()
    }

    /// Copies both segments from `source`. Lengths must match.
    pub fn copy_from(&self, source: &ActionBuffers) -> bool {
        let continuous = self.continuous_actions.copy_from(&source.continuous_actions);
        let discrete = self.discrete_actions.copy_from(&source.discrete_actions);
        continuous && discrete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliasing_segments_share_writes() {
        let backing = Rc::new(RefCell::new(vec![0.0f32; 6]));
        let first = ActionSegment::with_range(Rc::clone(&backing), 0, 4);
        let second = ActionSegment::with_range(Rc::clone(&backing), 2, 4);

        first.set(2, 7.5);

        assert_eq!(second.get(0), 7.5);
        assert_eq!(backing.borrow()[2], 7.5);
    }

    #[test]
    fn test_clear_only_touches_covered_range() {
        let backing = Rc::new(RefCell::new(vec![1, 2, 3, 4, 5]));
        let middle = ActionSegment::with_range(Rc::clone(&backing), 1, 3);

        middle.clear();

        assert_eq!(*backing.borrow(), vec![1, 0, 0, 0, 5]);
    }

    #[test]
    fn test_out_of_range_access_is_ignored() {
        let segment = ActionSegment::from_vec(vec![1, 2]);

        assert_eq!(segment.get(5), 0);
        segment.set(5, 42);
        assert_eq!(segment.to_vec(), vec![1, 2]);
    }

    #[test]
    fn test_equality_is_by_identity() {
        let segment = ActionSegment::from_vec(vec![1.0f32, 2.0]);
        let same_view = segment.clone();
        let same_values = ActionSegment::from_vec(vec![1.0f32, 2.0]);

        assert_eq!(segment, same_view);
        assert_ne!(segment, same_values);
        assert_eq!(ActionSegment::<f32>::empty(), ActionSegment::<f32>::empty());
    }

    #[test]
    fn test_sub_segment_offsets_into_parent() {
        let parent = ActionSegment::from_vec(vec![0, 1, 2, 3, 4, 5]);
        let child = parent.sub_segment(2, 3);

        assert_eq!(child.offset(), 2);
        assert_eq!(child.to_vec(), vec![2, 3, 4]);

        child.set(0, 20);
        assert_eq!(parent.get(2), 20);
    }

    #[test]
    fn test_copy_from_aliased_backing() {
        let backing = Rc::new(RefCell::new(vec![1, 2, 3, 0, 0, 0]));
        let source = ActionSegment::with_range(Rc::clone(&backing), 0, 3);
        let destination = ActionSegment::with_range(Rc::clone(&backing), 3, 3);

        assert!(destination.copy_from(&source));
        assert_eq!(*backing.borrow(), vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_copy_rejects_length_mismatch() {
        let destination = ActionSegment::from_vec(vec![0.0f32; 2]);
        let source = ActionSegment::from_vec(vec![1.0f32; 3]);

        assert!(!destination.copy_from(&source));
        assert_eq!(destination.to_vec(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_buffers_emptiness() {
        assert!(ActionBuffers::empty().is_empty());
        assert!(!ActionBuffers::zeroed(1, 0).is_empty());

        let buffers = ActionBuffers::from_vecs(vec![0.5], vec![3]);
        buffers.clear();
        assert_eq!(buffers.continuous_actions.to_vec(), vec![0.0]);
        assert_eq!(buffers.discrete_actions.to_vec(), vec![0]);
    }
}
