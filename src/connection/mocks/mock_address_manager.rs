//! Mocked implementation of the address manager for use in test. It mirrors
//! the real component's behavior of pausing its registered client around
//! every controller-list mutation, and additionally lets a test drive
//! rotation-style pause/resume cycles by hand.
//!
//! List mutations are queued; the test calls process_queued_operations to
//! start the pause handshake, and the mock applies the mutations and
//! resumes the client once the client acknowledges the pause. Explicit
//! pause()/resume() calls model an address-rotation cycle, whose resume
//! timing stays under test control.

use std::{
    cell::RefCell,
    collections::{HashSet, VecDeque},
    rc::Rc,
};

use crate::{
    connection::address_manager::{
        AddressPolicy, LeAddressManager, LeAddressManagerCallback, PrivacyPolicyParameters,
    },
    core::address::AddressWithType,
};

enum ListOperation {
    AddAcceptList(AddressWithType),
    RemoveAcceptList(AddressWithType),
    ClearAcceptList,
    AddResolvingList(AddressWithType),
    RemoveResolvingList(AddressWithType),
    ClearResolvingList,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PauseKind {
    ListUpdate,
    AddressRotation { acked: bool },
}

struct State {
    policy: AddressPolicy,
    initiator_address: AddressWithType,
    callback: Option<Rc<dyn LeAddressManagerCallback>>,
    accept_list: HashSet<AddressWithType>,
    resolving_list: HashSet<AddressWithType>,
    queued_operations: VecDeque<ListOperation>,
    pause: Option<PauseKind>,
    ack_pause_count: usize,
    ack_resume_count: usize,
    privacy_policy: Option<PrivacyPolicyParameters>,
}

/// Tracks the controller-resident lists and the pause handshake state
#[derive(Clone)]
pub struct MockLeAddressManager {
    state: Rc<RefCell<State>>,
}

impl MockLeAddressManager {
    /// Constructor
    pub fn new(policy: AddressPolicy, initiator_address: AddressWithType) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                policy,
                initiator_address,
                callback: None,
                accept_list: HashSet::new(),
                resolving_list: HashSet::new(),
                queued_operations: VecDeque::new(),
                pause: None,
                ack_pause_count: 0,
                ack_resume_count: 0,
                privacy_policy: None,
            })),
        }
    }

    fn callback(&self) -> Rc<dyn LeAddressManagerCallback> {
        self.state.borrow().callback.clone().expect("no client registered")
    }

    /// Start the pause handshake covering the queued list mutations. The
    /// mutations are applied, and the client resumed, once the client
    /// acknowledges the pause.
    pub fn process_queued_operations(&self) {
        {
            let mut state = self.state.borrow_mut();
            assert!(state.pause.is_none(), "processing operations while a pause is in flight");
            if state.queued_operations.is_empty() {
                return;
            }
            state.pause = Some(PauseKind::ListUpdate);
        }
        self.callback().on_pause();
    }

    /// Start an address-rotation pause. The test resumes it explicitly with
    /// resume(), after the client has acknowledged.
    pub fn pause(&self) {
        {
            let mut state = self.state.borrow_mut();
            assert!(state.pause.is_none(), "pausing while a pause is in flight");
            state.pause = Some(PauseKind::AddressRotation { acked: false });
        }
        self.callback().on_pause();
    }

    /// Finish an acknowledged address-rotation pause
    pub fn resume(&self) {
        {
            let mut state = self.state.borrow_mut();
            assert!(
                state.pause == Some(PauseKind::AddressRotation { acked: true }),
                "resuming before the pause was acknowledged"
            );
            state.pause = None;
        }
        self.callback().on_resume();
    }

    fn apply_queued_operations(state: &mut State) {
        for operation in state.queued_operations.drain(..) {
            match operation {
                ListOperation::AddAcceptList(address) => {
                    let inserted = state.accept_list.insert(address);
                    assert!(inserted, "{address:?} already on the accept list");
                }
                ListOperation::RemoveAcceptList(address) => {
                    let removed = state.accept_list.remove(&address);
                    assert!(removed, "{address:?} not on the accept list");
                }
                ListOperation::ClearAcceptList => state.accept_list.clear(),
                ListOperation::AddResolvingList(address) => {
                    let inserted = state.resolving_list.insert(address);
                    assert!(inserted, "{address:?} already on the resolving list");
                }
                ListOperation::RemoveResolvingList(address) => {
                    let removed = state.resolving_list.remove(&address);
                    assert!(removed, "{address:?} not on the resolving list");
                }
                ListOperation::ClearResolvingList => state.resolving_list.clear(),
            }
        }
    }

    /// The controller-resident accept list
    pub fn accept_list(&self) -> HashSet<AddressWithType> {
        self.state.borrow().accept_list.clone()
    }

    /// The controller-resident resolving list
    pub fn resolving_list(&self) -> HashSet<AddressWithType> {
        self.state.borrow().resolving_list.clone()
    }

    /// Whether a client is registered
    pub fn is_registered(&self) -> bool {
        self.state.borrow().callback.is_some()
    }

    /// Whether list mutations are queued but not yet applied
    pub fn has_queued_operations(&self) -> bool {
        !self.state.borrow().queued_operations.is_empty()
    }

    /// How many pauses the client has acknowledged
    pub fn ack_pause_count(&self) -> usize {
        self.state.borrow().ack_pause_count
    }

    /// How many resumes the client has acknowledged
    pub fn ack_resume_count(&self) -> usize {
        self.state.borrow().ack_resume_count
    }

    /// The last privacy policy configured, if any
    pub fn privacy_policy(&self) -> Option<PrivacyPolicyParameters> {
        self.state.borrow().privacy_policy
    }
}

impl LeAddressManager for MockLeAddressManager {
    fn register(&self, callback: Box<dyn LeAddressManagerCallback>) -> AddressPolicy {
        let mut state = self.state.borrow_mut();
        assert!(state.callback.is_none(), "client registered twice");
        state.callback = Some(Rc::from(callback));
        state.policy
    }

    fn unregister(&self) {
        let mut state = self.state.borrow_mut();
        assert!(state.callback.is_some(), "unregistering while not registered");
        state.callback = None;
    }

    fn ack_pause(&self) {
        let resume = {
            let mut state = self.state.borrow_mut();
            state.ack_pause_count += 1;
            match state.pause {
                Some(PauseKind::ListUpdate) => {
                    Self::apply_queued_operations(&mut state);
                    state.pause = None;
                    true
                }
                Some(PauseKind::AddressRotation { .. }) => {
                    state.pause = Some(PauseKind::AddressRotation { acked: true });
                    false
                }
                None => panic!("pause acknowledged while none is in flight"),
            }
        };
        if resume {
            self.callback().on_resume();
        }
    }

    fn ack_resume(&self) {
        self.state.borrow_mut().ack_resume_count += 1;
    }

    fn initiator_address(&self) -> AddressWithType {
        self.state.borrow().initiator_address
    }

    fn add_device_to_filter_accept_list(&self, address: AddressWithType) {
        let mut state = self.state.borrow_mut();
        assert!(state.callback.is_some(), "list operation before registration");
        state.queued_operations.push_back(ListOperation::AddAcceptList(address));
    }

    fn remove_device_from_filter_accept_list(&self, address: AddressWithType) {
        let mut state = self.state.borrow_mut();
        assert!(state.callback.is_some(), "list operation before registration");
        state.queued_operations.push_back(ListOperation::RemoveAcceptList(address));
    }

    fn clear_filter_accept_list(&self) {
        let mut state = self.state.borrow_mut();
        assert!(state.callback.is_some(), "list operation before registration");
        state.queued_operations.push_back(ListOperation::ClearAcceptList);
    }

    fn add_device_to_resolving_list(
        &self,
        address: AddressWithType,
        _peer_irk: [u8; 16],
        _local_irk: [u8; 16],
    ) {
        let mut state = self.state.borrow_mut();
        assert!(state.callback.is_some(), "list operation before registration");
        state.queued_operations.push_back(ListOperation::AddResolvingList(address));
    }

    fn remove_device_from_resolving_list(&self, address: AddressWithType) {
        let mut state = self.state.borrow_mut();
        assert!(state.callback.is_some(), "list operation before registration");
        state.queued_operations.push_back(ListOperation::RemoveResolvingList(address));
    }

    fn clear_resolving_list(&self) {
        let mut state = self.state.borrow_mut();
        assert!(state.callback.is_some(), "list operation before registration");
        state.queued_operations.push_back(ListOperation::ClearResolvingList);
    }

    fn set_privacy_policy(&self, parameters: PrivacyPolicyParameters) {
        self.state.borrow_mut().privacy_policy = Some(parameters);
    }
}
