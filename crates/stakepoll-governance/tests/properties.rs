//! Invariants under arbitrary operation sequences.

use proptest::prelude::*;
use stakepoll_governance::{
    CloseReason, Governance, GovernanceConfig, InMemoryCustody, ManualClock, NewPoll, RosterAuthorizer,
};
use stakepoll_types::{Address, Amount, Label};

const MEMBERS: u8 = 3;
const POLLS: u64 = 2;

#[derive(Debug, Clone)]
enum Op {
    Deposit(u8, Amount),
    Withdraw(u8, Amount),
    Vote(u8, u64, usize),
    AdminClose(u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..MEMBERS, 1..60u64).prop_map(|(m, a)| Op::Deposit(m, a)),
        3 => (0..MEMBERS, 1..80u64).prop_map(|(m, a)| Op::Withdraw(m, a)),
        3 => (0..MEMBERS, 0..POLLS, 0..4usize).prop_map(|(m, p, o)| Op::Vote(m, p, o)),
        1 => (0..POLLS).prop_map(Op::AdminClose),
    ]
}

fn member(n: u8) -> Address {
    Address::from_bytes([n + 1; 20])
}

fn admin() -> Address {
    Address::from_bytes([0xaa; 20])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn tallies_match_live_weights(ops in prop::collection::vec(op(), 1..80)) {
        let mut custody = InMemoryCustody::new();
        for n in 0..MEMBERS {
            custody.fund(member(n), 10_000).unwrap();
        }
        let mut gov = Governance::new(
            GovernanceConfig::default(),
            custody,
            RosterAuthorizer::open().with_admin(admin()),
            ManualClock::new(0),
        ).unwrap();

        for _ in 0..POLLS {
            let id = gov.create_poll(member(0), NewPoll {
                title: Label::new("p").unwrap(),
                description: Label::EMPTY,
                options: vec![Label::new("a").unwrap(), Label::new("b").unwrap(), Label::new("c").unwrap()],
                vote_limit: 400,
                quorum: 1,
                deadline: u64::MAX,
            }).unwrap();
            gov.activate_poll(id, member(0)).unwrap();
        }

        for op in ops {
            let before: Vec<Vec<Amount>> = (0..POLLS).map(|p| gov.tallies_for_poll(p).unwrap()).collect();
            let result = match op {
                Op::Deposit(m, a) => gov.deposit(member(m), a).map(|_| ()),
                Op::Withdraw(m, a) => gov.withdraw(member(m), a).map(|_| ()),
                Op::Vote(m, p, o) => gov.cast_vote(p, member(m), o).map(|_| ()),
                Op::AdminClose(p) => gov.close_poll(p, admin(), CloseReason::AdminForced).map(|_| ()),
            };
            if result.is_err() {
                let after: Vec<Vec<Amount>> = (0..POLLS).map(|p| gov.tallies_for_poll(p).unwrap()).collect();
                prop_assert_eq!(&before, &after);
            }

            let balances: Amount = (0..MEMBERS).map(|n| gov.balance_of(&member(n))).sum();
            prop_assert_eq!(balances, gov.total_deposited());
            prop_assert_eq!(balances, gov.deposits().custody().pool_balance());

            let engine = gov.engine();
            for p in 0..POLLS {
                let poll = engine.poll(p).unwrap();
                if !poll.open {
                    continue;
                }
                let tallies: Amount = engine.tallies(p).unwrap().iter().sum();
                prop_assert_eq!(tallies, engine.ledger().total_weight(p));

                for n in 0..MEMBERS {
                    let who = member(n);
                    if engine.participation(&who).contains(&p) {
                        let record = engine.ledger().record(p, &who).unwrap();
                        prop_assert_eq!(record.weight, gov.balance_of(&who));
                    }
                }
            }
        }
    }
}
