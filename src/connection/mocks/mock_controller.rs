//! Mocked implementation of the controller command interface for use in
//! test. Commands are captured in order together with their completion
//! callbacks; the test decides when and with which status each settles, so
//! command/event interleavings can be forced.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use crate::connection::{
    controller::{
        CommandCompleteCallback, CommandStatusCallback, ConnectionParameterRequestReply,
        DefaultSubrateParameters, LeAclConnectionInterface, LeCreateConnectionParameters,
        LeExtendedCreateConnectionParameters,
    },
    ids::ConnectionHandle,
};

/// A command captured by the mock, with its completion callback
pub enum MockCommand {
    /// A legacy create-connection command
    CreateConnection {
        /// The command parameters
        parameters: LeCreateConnectionParameters,
        /// Deliver the command status
        on_status: CommandStatusCallback,
    },
    /// An extended create-connection command
    ExtendedCreateConnection {
        /// The command parameters
        parameters: LeExtendedCreateConnectionParameters,
        /// Deliver the command status
        on_status: CommandStatusCallback,
    },
    /// A create-connection-cancel command
    CreateConnectionCancel {
        /// Deliver the command completion
        on_complete: CommandCompleteCallback,
    },
    /// A write-suggested-default-data-length command
    WriteSuggestedDefaultDataLength {
        /// Suggested payload octets
        tx_octets: u16,
        /// Suggested transmit time
        tx_time: u16,
        /// Deliver the command completion
        on_complete: CommandCompleteCallback,
    },
    /// A set-default-subrate command
    SetDefaultSubrate {
        /// The command parameters
        parameters: DefaultSubrateParameters,
        /// Deliver the command completion
        on_complete: CommandCompleteCallback,
    },
    /// A remote-connection-parameter-request reply
    ConnectionParameterRequestReply {
        /// The affected connection
        handle: ConnectionHandle,
        /// The accepted parameters
        reply: ConnectionParameterRequestReply,
        /// Deliver the command completion
        on_complete: CommandCompleteCallback,
    },
}

/// Captures every issued command for inspection and manual completion
#[derive(Clone, Default)]
pub struct MockController {
    commands: Rc<RefCell<VecDeque<MockCommand>>>,
}

impl MockController {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest captured command, if any
    pub fn pop_command(&self) -> Option<MockCommand> {
        self.commands.borrow_mut().pop_front()
    }

    /// The number of captured commands not yet taken
    pub fn outstanding_command_count(&self) -> usize {
        self.commands.borrow().len()
    }
}

impl LeAclConnectionInterface for MockController {
    fn create_connection(
        &self,
        parameters: LeCreateConnectionParameters,
        on_status: CommandStatusCallback,
    ) {
        self.commands.borrow_mut().push_back(MockCommand::CreateConnection { parameters, on_status });
    }

    fn extended_create_connection(
        &self,
        parameters: LeExtendedCreateConnectionParameters,
        on_status: CommandStatusCallback,
    ) {
        self.commands
            .borrow_mut()
            .push_back(MockCommand::ExtendedCreateConnection { parameters, on_status });
    }

    fn create_connection_cancel(&self, on_complete: CommandCompleteCallback) {
        self.commands.borrow_mut().push_back(MockCommand::CreateConnectionCancel { on_complete });
    }

    fn write_suggested_default_data_length(
        &self,
        tx_octets: u16,
        tx_time: u16,
        on_complete: CommandCompleteCallback,
    ) {
        self.commands.borrow_mut().push_back(MockCommand::WriteSuggestedDefaultDataLength {
            tx_octets,
            tx_time,
            on_complete,
        });
    }

    fn set_default_subrate(
        &self,
        parameters: DefaultSubrateParameters,
        on_complete: CommandCompleteCallback,
    ) {
        self.commands
            .borrow_mut()
            .push_back(MockCommand::SetDefaultSubrate { parameters, on_complete });
    }

    fn connection_parameter_request_reply(
        &self,
        handle: ConnectionHandle,
        reply: ConnectionParameterRequestReply,
        on_complete: CommandCompleteCallback,
    ) {
        self.commands.borrow_mut().push_back(MockCommand::ConnectionParameterRequestReply {
            handle,
            reply,
            on_complete,
        });
    }
}
