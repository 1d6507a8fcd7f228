//! This module defines and re-exports the interfaces for the entity store.
//! It serves as a central point for accessing traits related to data interaction.
mod actions;
mod cursor_repository;
mod views;

pub use actions::{ActionsRepository, SEARCH_PAGE_SIZE};
pub use cursor_repository::CursorRepository;
pub use views::ViewsRepository;
