//! Drag and drop intent resolution.
//!
//! A drop zone receives [`DragEvent`]s from the gesture source and decides
//! what a drop means: native files from outside the app become an upload,
//! an internal item becomes a move. Illegal drops (no-op moves, a folder
//! into its own subtree) are rejected both while hovering and on drop.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bucketfile_core::path::{get_parent_path, is_within, normalize_folder};
use bucketfile_core::{FileDescriptor, ItemRef};

use crate::operation::FileOperation;

/// Drag state shared by every drop zone of one window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DragState {
    /// The internal item under drag, if any.
    pub dragging_item: Option<ItemRef>,
    /// Folder currently highlighted as a valid drop destination.
    pub current_drop_target: Option<String>,
}

/// Handle to the shared drag state.
pub type SharedDragState = Arc<Mutex<DragState>>;

impl DragState {
    /// Create a fresh shared state.
    pub fn shared() -> SharedDragState {
        Arc::new(Mutex::new(Self::default()))
    }

    /// Forget the current gesture.
    pub fn reset(&mut self) {
        self.dragging_item = None;
        self.current_drop_target = None;
    }
}

/// What kind of data a drag carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Files dragged in from the operating system.
    Files,
    /// An item dragged from inside the app.
    Item,
}

/// Data delivered on drop.
#[derive(Debug, Clone)]
pub enum DragPayload {
    /// Native files.
    Files(Vec<FileDescriptor>),
    /// A serialized [`ItemRef`].
    Item(String),
}

impl DragPayload {
    /// Serialize an item for transfer.
    pub fn item(item: &ItemRef) -> Result<Self, serde_json::Error> {
        serde_json::to_string(item).map(Self::Item)
    }

    /// The kind of this payload.
    pub fn kind(&self) -> PayloadKind {
        match self {
            Self::Files(_) => PayloadKind::Files,
            Self::Item(_) => PayloadKind::Item,
        }
    }
}

/// A pointer position in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bounding rectangle of a drop zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    /// Create a rectangle from its origin and size.
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            right: left + width,
            bottom: top + height,
        }
    }

    /// Whether `point` is inside or on the edge of the rectangle.
    pub fn contains(&self, point: Point) -> bool {
        !(point.x < self.left
            || point.x > self.right
            || point.y < self.top
            || point.y > self.bottom)
    }
}

/// Gesture messages delivered to a drop zone.
#[derive(Debug, Clone)]
pub enum DragEvent {
    /// An internal item started being dragged.
    Start(ItemRef),
    /// The drag entered the zone.
    Enter(PayloadKind),
    /// The drag moved within the zone.
    Over(PayloadKind),
    /// The pointer left the zone or one of its children.
    Leave { pointer: Point, zone: Rect },
    /// The payload was released over the zone.
    Drop(DragPayload),
    /// The gesture was cancelled (escape, drop outside any zone).
    Cancel,
    /// The gesture source reported the end of the drag.
    End,
}

/// What a completed drop asks the store to do.
#[derive(Debug, Clone)]
pub enum DropCommand {
    /// Upload native files into `destination`.
    Upload {
        files: Vec<FileDescriptor>,
        destination: String,
    },
    /// Move an existing item into `destination`.
    Move { item: ItemRef, destination: String },
}

impl From<DropCommand> for FileOperation {
    fn from(command: DropCommand) -> Self {
        match command {
            DropCommand::Upload { files, destination } => Self::upload(files, destination),
            DropCommand::Move { item, destination } => Self::move_to(item, destination),
        }
    }
}

/// Whether `dragging` may be dropped into `current_path`.
///
/// Illegal when nothing is dragging, when the item already lives in
/// `current_path`, or when a folder would be dropped into itself or one of
/// its descendants.
pub fn can_drop_here(dragging: Option<&ItemRef>, current_path: &str) -> bool {
    let Some(item) = dragging else {
        return false;
    };

    let source_folder = normalize_folder(get_parent_path(&item.key));
    if source_folder == normalize_folder(current_path) {
        return false;
    }

    if item.is_folder && is_within(current_path, &item.key) {
        return false;
    }

    true
}

/// Callback for item drops that replaces the default move.
pub type ItemDropHandler = Box<dyn Fn(&ItemRef, &str) + Send + Sync>;

/// A folder view that accepts drops.
pub struct DropZone {
    current_path: String,
    state: SharedDragState,
    file_drag_over: bool,
    item_drag_over: bool,
    on_item_drop: Option<ItemDropHandler>,
}

impl std::fmt::Debug for DropZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropZone")
            .field("current_path", &self.current_path)
            .field("file_drag_over", &self.file_drag_over)
            .field("item_drag_over", &self.item_drag_over)
            .field("custom_handler", &self.on_item_drop.is_some())
            .finish()
    }
}

impl DropZone {
    /// Create a drop zone for the folder at `current_path`.
    pub fn new(current_path: impl Into<String>, state: SharedDragState) -> Self {
        Self {
            current_path: current_path.into(),
            state,
            file_drag_over: false,
            item_drag_over: false,
            on_item_drop: None,
        }
    }

    /// Route item drops to `handler` instead of emitting a move.
    pub fn with_item_handler(
        mut self,
        handler: impl Fn(&ItemRef, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_item_drop = Some(Box::new(handler));
        self
    }

    /// The folder this zone represents.
    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Navigate the zone to another folder.
    pub fn set_current_path(&mut self, path: impl Into<String>) {
        self.clear_indicators();
        self.current_path = path.into();
    }

    /// Whether native files are hovering over the zone.
    pub fn is_file_drag_over(&self) -> bool {
        self.file_drag_over
    }

    /// Whether a legal internal item is hovering over the zone.
    pub fn is_item_drag_over(&self) -> bool {
        self.item_drag_over
    }

    fn state(&self) -> MutexGuard<'_, DragState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn clear_indicators(&mut self) {
        self.file_drag_over = false;
        self.item_drag_over = false;
        let mut state = self.state();
        if state.current_drop_target.as_deref() == Some(self.current_path.as_str()) {
            state.current_drop_target = None;
        }
    }

    fn end_gesture(&mut self) {
        self.file_drag_over = false;
        self.item_drag_over = false;
        self.state().reset();
    }

    fn hover(&mut self, kind: PayloadKind) {
        let path = self.current_path.clone();
        let mut state = self.state();
        let accept = match kind {
            PayloadKind::Files => true,
            PayloadKind::Item => can_drop_here(state.dragging_item.as_ref(), &path),
        };

        if accept {
            state.current_drop_target = Some(path);
        } else if state.current_drop_target.as_deref() == Some(path.as_str()) {
            state.current_drop_target = None;
        }
        drop(state);

        self.file_drag_over = kind == PayloadKind::Files;
        self.item_drag_over = kind == PayloadKind::Item && accept;
    }

    /// Process one gesture event, returning the operation a drop resolved to.
    pub fn handle(&mut self, event: DragEvent) -> Option<DropCommand> {
        match event {
            DragEvent::Start(item) => {
                let mut state = self.state();
                state.dragging_item = Some(item);
                state.current_drop_target = None;
                None
            }
            DragEvent::Enter(kind) | DragEvent::Over(kind) => {
                self.hover(kind);
                None
            }
            DragEvent::Leave { pointer, zone } => {
                if !zone.contains(pointer) {
                    self.clear_indicators();
                }
                None
            }
            DragEvent::Cancel | DragEvent::End => {
                self.end_gesture();
                None
            }
            DragEvent::Drop(payload) => {
                self.end_gesture();
                self.resolve_drop(payload)
            }
        }
    }

    fn resolve_drop(&self, payload: DragPayload) -> Option<DropCommand> {
        match payload {
            DragPayload::Files(files) => {
                if files.is_empty() {
                    return None;
                }
                tracing::debug!(count = files.len(), destination = %self.current_path, "Files dropped");
                Some(DropCommand::Upload {
                    files,
                    destination: self.current_path.clone(),
                })
            }
            DragPayload::Item(data) => {
                let item: ItemRef = match serde_json::from_str(&data) {
                    Ok(item) => item,
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring malformed drag payload");
                        return None;
                    }
                };

                if !can_drop_here(Some(&item), &self.current_path) {
                    tracing::debug!(key = %item.key, destination = %self.current_path, "Rejected illegal drop");
                    return None;
                }

                match &self.on_item_drop {
                    Some(handler) => {
                        handler(&item, &self.current_path);
                        None
                    }
                    None => Some(DropCommand::Move {
                        item,
                        destination: self.current_path.clone(),
                    }),
                }
            }
        }
    }
}

/// Run a drop zone over a channel of gesture events.
///
/// Resolved operations are forwarded to `commands`. The task ends when the
/// event channel closes or the command receiver is dropped.
pub fn spawn_drop_zone(
    mut zone: DropZone,
    mut events: mpsc::Receiver<DragEvent>,
    commands: mpsc::Sender<DropCommand>,
) -> JoinHandle<DropZone> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(command) = zone.handle(event) {
                if commands.send(command).await.is_err() {
                    break;
                }
            }
        }
        zone
    })
}
