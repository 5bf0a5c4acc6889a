//! Mocked collaborators and callback sinks for use in test

pub mod harness;
pub mod mock_acceptlist_callbacks;
pub mod mock_address_manager;
pub mod mock_connection_callbacks;
pub mod mock_connection_management_callbacks;
pub mod mock_controller;
pub mod mock_scheduler;
