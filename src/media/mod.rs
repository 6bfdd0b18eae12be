//! Concrete collaborators: clip store on disk and a headless player surface.

pub mod headless;
pub mod store;

pub use headless::HeadlessPlayer;
pub use store::ClipStore;
