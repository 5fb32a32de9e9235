//! End-to-end flows through the governance facade.

use std::sync::Arc;

use parking_lot::Mutex;
use stakepoll_governance::{
    BalanceChange, BalanceChangeListener, CloseReason, Governance, GovernanceConfig, GovernanceError,
    InMemoryCustody, ManualClock, NewPoll, RosterAuthorizer, Transactional,
};
use stakepoll_types::{Address, Amount, ContentHash, Label};

type TestGovernance = Governance<InMemoryCustody, RosterAuthorizer, ManualClock>;

const NOW: u64 = 1_700_000_000;

fn owner() -> Address {
    Address::derive(b"owner")
}

fn owner1() -> Address {
    Address::derive(b"owner1")
}

fn admin() -> Address {
    Address::derive(b"admin")
}

fn setup() -> (TestGovernance, ManualClock) {
    let clock = ManualClock::new(NOW);
    let mut custody = InMemoryCustody::new();
    custody.fund(owner(), 100).unwrap();
    custody.fund(owner1(), 50).unwrap();
    let auth = RosterAuthorizer::open().with_admin(admin());
    let gov = Governance::new(GovernanceConfig::default(), custody, auth, clock.clone()).unwrap();
    (gov, clock)
}

fn new_poll(title: &str, options: &[&str], vote_limit: Amount, deadline: u64) -> NewPoll {
    NewPoll {
        title: Label::new(title).unwrap(),
        description: Label::new("New Description").unwrap(),
        options: options.iter().map(|o| Label::new(o).unwrap()).collect(),
        vote_limit,
        quorum: 2,
        deadline,
    }
}

fn active_poll(gov: &mut TestGovernance, vote_limit: Amount) -> u64 {
    let id = gov
        .create_poll(owner(), new_poll("New Poll", &["1", "2"], vote_limit, NOW + 10_000))
        .unwrap();
    gov.activate_poll(id, owner()).unwrap();
    id
}

#[test]
fn test_scenarios_track_live_balances() {
    let (mut gov, _) = setup();
    let poll = active_poll(&mut gov, 150);

    // Deposit 50, vote option 1.
    gov.deposit(owner(), 50).unwrap();
    gov.cast_vote(poll, owner(), 1).unwrap();
    assert_eq!(gov.tallies_for_poll(poll).unwrap(), vec![50, 0]);

    // Partial withdrawal follows into the tally.
    gov.withdraw(owner(), 25).unwrap();
    assert_eq!(gov.tallies_for_poll(poll).unwrap(), vec![25, 0]);

    // A second member votes option 2.
    gov.deposit(owner1(), 50).unwrap();
    gov.cast_vote(poll, owner1(), 2).unwrap();
    assert_eq!(gov.tallies_for_poll(poll).unwrap(), vec![25, 50]);

    // Full withdrawal retracts all weight but keeps the choice on record.
    gov.withdraw(owner(), 25).unwrap();
    assert_eq!(gov.tallies_for_poll(poll).unwrap(), vec![0, 50]);
    assert!(gov.polls_member_participates_in(&owner()).is_empty());
    assert_eq!(gov.chosen_option(poll, &owner()), Some(1));

    // Admin close zeroes every tally and shuts the poll.
    assert!(gov.close_poll(poll, admin(), CloseReason::AdminForced).unwrap());
    let closed = gov.poll_by_id(poll).unwrap();
    assert!(!closed.open);
    assert_eq!(gov.tallies_for_poll(poll).unwrap(), vec![0, 0]);
    assert!(gov.polls_member_participates_in(&owner1()).is_empty());
    assert_eq!(gov.cast_vote(poll, owner(), 1), Err(GovernanceError::PollNotOpen(poll)));

    // Closing again changes nothing.
    assert!(!gov.close_poll(poll, admin(), CloseReason::AdminForced).unwrap());
    assert_eq!(gov.tallies_for_poll(poll).unwrap(), vec![0, 0]);
    assert_eq!(gov.clamp_count(), 0);
}

#[test]
fn test_vote_limit_ceiling_allocates_no_id() {
    let (mut gov, _) = setup();
    let result = gov.create_poll(owner(), new_poll("New Poll", &["1", "2"], 35_001, NOW + 10_000));
    assert_eq!(
        result,
        Err(GovernanceError::VoteLimitExceeded { attempted: 35_001, limit: 35_000 })
    );
    assert_eq!(gov.poll_count(), 0);

    let id = gov
        .create_poll(owner(), new_poll("New Poll", &["1", "2"], 35_000, NOW + 10_000))
        .unwrap();
    assert_eq!(id, 0);
}

#[test]
fn test_full_session() {
    let (mut gov, _) = setup();

    gov.deposit(owner(), 50).unwrap();
    assert_eq!(gov.balance_of(&owner()), 50);
    gov.withdraw(owner(), 25).unwrap();
    assert_eq!(gov.balance_of(&owner()), 25);

    let first = gov
        .create_poll(owner(), new_poll("New Poll", &["1", "2"], 150, NOW + 10_000))
        .unwrap();
    assert_eq!(gov.poll_count(), 1);
    assert!(gov
        .create_poll(owner(), new_poll("New Poll", &["1", "2"], 35_001, NOW + 10_000))
        .is_err());

    gov.activate_poll(first, owner()).unwrap();
    assert!(gov.poll_by_id(first).unwrap().active);
    assert_eq!(gov.poll_by_id(first).unwrap().owner, owner());

    let hash = ContentHash::digest(b"1234567890");
    assert!(!gov.add_content_hash(first, owner1(), hash).unwrap());
    assert!(gov.content_hashes_of_poll(first).unwrap().is_empty());
    assert!(gov.add_content_hash(first, owner(), hash).unwrap());
    assert_eq!(gov.content_hashes_of_poll(first).unwrap(), vec![hash]);
    assert_eq!(gov.titles_of_all_polls().len(), 1);

    gov.cast_vote(first, owner(), 1).unwrap();
    assert_eq!(gov.cast_vote(first, owner(), 1), Err(GovernanceError::AlreadyVoted(first)));
    assert_eq!(gov.cast_vote(first, owner(), 2), Err(GovernanceError::AlreadyVoted(first)));
    assert_eq!(gov.polls_member_participates_in(&owner()), vec![first]);
    assert_eq!(gov.chosen_option(first, &owner()), Some(1));

    let second = gov
        .create_poll(
            owner(),
            new_poll("New Poll2", &["Test Option 1", "Test Option 2"], 75, NOW + 1_000),
        )
        .unwrap();
    assert_eq!(gov.poll_count(), 2);
    gov.activate_poll(second, owner()).unwrap();
    assert_eq!(gov.options_of_poll(first).unwrap().len(), 2);

    gov.cast_vote(second, owner(), 1).unwrap();
    assert_eq!(gov.polls_member_participates_in(&owner()), vec![first, second]);
    let titles: Vec<String> = gov.titles_of_all_polls().iter().map(|t| t.to_string()).collect();
    assert_eq!(titles, vec!["New Poll", "New Poll2"]);

    // No deposit, no vote.
    assert_eq!(gov.cast_vote(first, owner1(), 1), Err(GovernanceError::NoVotingPower));

    gov.deposit(owner1(), 50).unwrap();
    gov.cast_vote(first, owner1(), 2).unwrap();
    // 25 + 50 reaches the second poll's limit of 75 and decides it.
    assert_eq!(gov.cast_vote(second, owner1(), 1).unwrap(), 75);

    assert_eq!(gov.tallies_for_poll(first).unwrap(), vec![25, 50]);
    assert_eq!(gov.tallies_for_poll(second).unwrap(), vec![75, 0]);
    let decided = gov.poll_by_id(second).unwrap();
    assert!(!decided.open);
    assert_eq!(decided.closed_by, Some(CloseReason::VoteLimitReached));
    assert_eq!(gov.polls_member_participates_in(&owner1()), vec![first]);

    gov.withdraw(owner1(), 5).unwrap();
    assert_eq!(gov.tallies_for_poll(first).unwrap(), vec![25, 45]);
    gov.withdraw(owner1(), 45).unwrap();
    assert_eq!(gov.tallies_for_poll(first).unwrap(), vec![25, 0]);
    assert!(gov.polls_member_participates_in(&owner1()).is_empty());

    assert!(!gov.poll_by_id(second).unwrap().open);
    assert!(gov.poll_by_id(first).unwrap().open);

    gov.close_poll(first, admin(), CloseReason::AdminForced).unwrap();
    assert!(!gov.poll_by_id(first).unwrap().open);
    assert_eq!(gov.tallies_for_poll(second).unwrap(), vec![75, 0]);
}

#[test]
fn test_withdraw_more_than_deposited() {
    let (mut gov, _) = setup();
    gov.deposit(owner(), 30).unwrap();
    assert_eq!(
        gov.withdraw(owner(), 31),
        Err(GovernanceError::InsufficientBalance { requested: 31, available: 30 })
    );
    assert_eq!(gov.balance_of(&owner()), 30);
}

#[test]
fn test_expired_polls_close_and_reset() {
    let (mut gov, clock) = setup();
    let poll = active_poll(&mut gov, 150);
    gov.deposit(owner(), 40).unwrap();
    gov.cast_vote(poll, owner(), 2).unwrap();

    clock.advance(10_000);
    assert!(gov.close_expired().unwrap().is_empty());
    clock.advance(1);
    assert_eq!(gov.close_expired().unwrap(), vec![poll]);
    assert_eq!(gov.tallies_for_poll(poll).unwrap(), vec![0, 0]);
    assert_eq!(gov.poll_by_id(poll).unwrap().closed_by, Some(CloseReason::DeadlinePassed));
    assert!(gov.close_expired().unwrap().is_empty());

    // Balance changes after the close no longer touch the poll.
    gov.deposit(owner(), 10).unwrap();
    assert_eq!(gov.tallies_for_poll(poll).unwrap(), vec![0, 0]);
}

/// Listener that rejects every balance change.
#[derive(Default)]
struct Veto;

impl Transactional for Veto {
    fn begin(&mut self) {}
    fn commit(&mut self) {}
    fn rollback(&mut self) {}
}

impl BalanceChangeListener for Veto {
    fn on_balance_changed(&mut self, _change: &BalanceChange) -> Result<(), GovernanceError> {
        Err(GovernanceError::ConsistencyViolation("vetoed".to_string()))
    }
}

#[test]
fn test_failing_listener_rolls_back_weight_adjustment() {
    let (mut gov, _) = setup();
    let poll = active_poll(&mut gov, 150);
    gov.deposit(owner(), 40).unwrap();
    gov.cast_vote(poll, owner(), 1).unwrap();

    assert!(gov.register_listener(Arc::new(Mutex::new(Veto))));

    assert!(gov.withdraw(owner(), 40).is_err());
    assert_eq!(gov.balance_of(&owner()), 40);
    assert_eq!(gov.tallies_for_poll(poll).unwrap(), vec![40, 0]);
    assert_eq!(gov.polls_member_participates_in(&owner()), vec![poll]);
    assert_eq!(gov.deposits().custody().wallet_balance(&owner()), 60);

    assert!(gov.deposit(owner(), 10).is_err());
    assert_eq!(gov.tallies_for_poll(poll).unwrap(), vec![40, 0]);
}
