//! Routing of the abstract capture trigger to per-holder input channels.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Whoever currently holds the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HolderId {
    RightController,
    LeftController,
    Cursor,
    /// Any other holder kind, by name.
    Other(String),
}

/// Path of a boolean input action, e.g. `/actions/rightHand/takeSnapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionPath(Cow<'static, str>);

impl ActionPath {
    pub const fn from_static(path: &'static str) -> Self {
        Self(Cow::Borrowed(path))
    }

    pub fn new(path: impl Into<String>) -> Self {
        Self(Cow::Owned(path.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const RIGHT_HAND_TAKE_SNAPSHOT: ActionPath =
    ActionPath::from_static("/actions/rightHand/takeSnapshot");
pub const LEFT_HAND_TAKE_SNAPSHOT: ActionPath =
    ActionPath::from_static("/actions/leftHand/takeSnapshot");
pub const CURSOR_TAKE_SNAPSHOT: ActionPath =
    ActionPath::from_static("/actions/cursor/takeSnapshot");

/// Current state of the input actions.
pub trait InputSource {
    fn is_asserted(&self, action: &ActionPath) -> bool;
}

/// A set of currently asserted actions.
impl InputSource for HashSet<ActionPath> {
    fn is_asserted(&self, action: &ActionPath) -> bool {
        self.contains(action)
    }
}

/// Maps each holder kind to the action that fires the capture.
#[derive(Debug, Clone)]
pub struct TriggerRouter {
    bindings: HashMap<HolderId, ActionPath>,
}

impl Default for TriggerRouter {
    /// Right and left controllers and the cursor each have their own
    /// snapshot action.
    fn default() -> Self {
        let mut router = Self::empty();
        router.bind(HolderId::RightController, RIGHT_HAND_TAKE_SNAPSHOT);
        router.bind(HolderId::LeftController, LEFT_HAND_TAKE_SNAPSHOT);
        router.bind(HolderId::Cursor, CURSOR_TAKE_SNAPSHOT);
        router
    }
}

impl TriggerRouter {
    pub fn empty() -> Self {
        Self {
            bindings: HashMap::new(),
        }
    }

    /// Bind `holder` to `action`, replacing any previous binding.
    pub fn bind(&mut self, holder: HolderId, action: ActionPath) {
        self.bindings.insert(holder, action);
    }

    pub fn unbind(&mut self, holder: &HolderId) -> Option<ActionPath> {
        self.bindings.remove(holder)
    }

    pub fn binding(&self, holder: &HolderId) -> Option<&ActionPath> {
        self.bindings.get(holder)
    }

    /// Whether the capture action bound to `holder` is asserted. False when
    /// nobody holds the device or the holder has no binding.
    pub fn is_triggered(&self, holder: Option<&HolderId>, input: &dyn InputSource) -> bool {
        holder
            .and_then(|h| self.bindings.get(h))
            .is_some_and(|action| input.is_asserted(action))
    }
}
