//! Integration property tests for account-core.
//!
//! These tests validate cross-module invariants: the access filter, the
//! transaction completion rule, protocol negotiation and credential
//! derivation.

use std::collections::BTreeSet;

use account_core::{
    authorize, AccessGate, AccessTable, AccountNameSanitizer, BeginFailure, CandidateOptions,
    Completion, ContextFactory, CredentialDeriver, Decision, FactoryError, MemoryStore,
    Negotiator, NegotiatorConfig, Operation, Outcome, Passphrase, Principal, ProtocolSelection,
    ProtocolVersion, RequestMeta, Role, RoleRequirement, Sanitizer, Tainted, TransactionManager,
    TrustAnchors, TrustStore,
};
use http::StatusCode;
use proptest::prelude::*;

const ALL_PROTOCOLS: [ProtocolVersion; 4] = [
    ProtocolVersion::Tls13,
    ProtocolVersion::Tls12,
    ProtocolVersion::Tls11,
    ProtocolVersion::Tls10,
];

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::SERVICE_ADMIN),
        Just(Role::ACCOUNT_OWNER),
        prop::string::string_regex("[a-z]{3,10}")
            .unwrap()
            .prop_map(Role::new),
    ]
}

fn arb_operation() -> impl Strategy<Value = Operation> {
    prop::sample::select(Operation::ALL.to_vec())
}

fn arb_protocols() -> impl Strategy<Value = Vec<ProtocolVersion>> {
    prop::sample::subsequence(ALL_PROTOCOLS.to_vec(), 0..=4)
}

/// Supports exactly the given protocols.
struct SubsetFactory(Vec<ProtocolVersion>);

impl ContextFactory for SubsetFactory {
    type Context = ProtocolVersion;

    fn create(
        &self,
        protocol: ProtocolVersion,
        _anchors: &TrustAnchors,
        _options: CandidateOptions,
    ) -> Result<Self::Context, FactoryError> {
        if self.0.contains(&protocol) {
            Ok(protocol)
        } else {
            Err(FactoryError::Unsupported(protocol.to_string()))
        }
    }
}

fn test_trust_store() -> (tempfile::TempDir, TrustStore) {
    let dir = tempfile::tempdir().unwrap();
    let material = account_core::keys::generate("proptest", &["localhost".to_string()]).unwrap();
    let written = account_core::keys::write_keys(&material, "proptest", dir.path()).unwrap();
    (dir, TrustStore::new(written.trust_store))
}

proptest! {
    /// Property: the filter allows exactly when the role sets intersect,
    /// and reports the first acceptable role in requirement order.
    #[test]
    fn proptest_authorize_is_set_intersection(
        operation in arb_operation(),
        required in prop::collection::vec(arb_role(), 1..4),
        held in prop::collection::btree_set(arb_role(), 0..4),
    ) {
        let requirement = RoleRequirement::new(operation, required.clone());
        let decision = authorize(operation, &requirement, &held);

        let expected = requirement.roles.iter().find(|r| held.contains(*r)).cloned();
        match (expected, decision) {
            (Some(role), Decision::Allow(granted)) => prop_assert_eq!(role, granted),
            (None, Decision::Deny(status)) => prop_assert_eq!(status, StatusCode::FORBIDDEN),
            (expected, decision) => {
                return Err(TestCaseError::fail(format!(
                    "expected {:?}, got {:?}",
                    expected, decision
                )));
            }
        }
    }

    /// Property: resolving the table twice yields the same mapping.
    #[test]
    fn proptest_table_resolution_is_idempotent(
        overrides in prop::collection::vec(
            (arb_operation(), prop::collection::vec(arb_role(), 1..4))
                .prop_map(|(op, roles)| RoleRequirement::new(op, roles)),
            0..4,
        )
    ) {
        let first = AccessTable::resolve(&overrides).unwrap();
        let second = AccessTable::resolve(&overrides).unwrap();
        prop_assert_eq!(&first, &second);

        for op in Operation::ALL {
            prop_assert!(first.requirement(op).is_some());
        }
    }

    /// Property: the gate never admits a request without a principal.
    #[test]
    fn proptest_gate_requires_principal(
        operation in arb_operation(),
        roles in prop::collection::btree_set(arb_role(), 0..3),
        authenticated in any::<bool>(),
    ) {
        let meta = RequestMeta {
            request_id: "req-prop".to_string(),
            method: "GET".to_string(),
            path: "/".to_string(),
            principal: authenticated.then(|| Principal::new("alice", roles.clone())),
        };

        match AccessGate::default().admit(meta, operation) {
            Ok(ctx) => {
                prop_assert!(authenticated);
                prop_assert!(roles.contains(ctx.granted_role()));
            }
            Err(violation) => {
                let expected: u16 = if authenticated { 403 } else { 401 };
                prop_assert_eq!(violation.kind.status(), expected);
            }
        }
    }

    /// Property: a unit of work commits iff it is not marked and the status is below 400.
    #[test]
    fn proptest_completion_rule(
        status in 200u16..600,
        rollback_only in any::<bool>(),
    ) {
        let store = MemoryStore::new();
        let manager = TransactionManager::new(store, BeginFailure::Proceed);
        let ctx = AccessGate::default()
            .admit(
                RequestMeta {
                    request_id: "req-prop".to_string(),
                    method: "POST".to_string(),
                    path: "/users".to_string(),
                    principal: Some(Principal::new("admin", [Role::SERVICE_ADMIN])),
                },
                Operation::CreateAccount,
            )
            .unwrap();

        let status = StatusCode::from_u16(status).unwrap();
        let mut outcome = Outcome::status(status);
        if rollback_only {
            outcome = outcome.mark_rollback_only();
        }

        let mut uow = manager.begin(&ctx).unwrap();
        let completion = manager.complete(&mut uow, &outcome, &ctx).unwrap();

        prop_assert!(!uow.is_active());
        prop_assert_eq!(
            completion == Completion::Committed,
            !rollback_only && status.as_u16() < 400
        );
    }

    /// Property: account names from the sanitizer are trimmed and never empty.
    #[test]
    fn proptest_account_names_are_trimmed(
        name in "[a-zA-Z0-9._-]{1,32}",
        padding in "[ \\t]{0,4}",
    ) {
        let input = format!("{}{}{}", padding, name, padding);
        let verified = AccountNameSanitizer::default().sanitize(Tainted::new(input)).unwrap();
        prop_assert_eq!(verified.as_ref(), &name);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: the first supported protocol in preference order is chosen,
    /// and exhausting the list is a configuration error.
    #[test]
    fn proptest_negotiator_picks_first_supported(
        preference in arb_protocols(),
        supported in arb_protocols(),
    ) {
        let (_dir, store) = test_trust_store();
        let negotiator = Negotiator::new(SubsetFactory(supported.clone()), NegotiatorConfig::default());

        let result = negotiator.negotiate(&ProtocolSelection::Preference(preference.clone()), Some(&store));
        let expected = preference.iter().find(|p| supported.contains(p)).copied();

        match (expected, result) {
            (Some(protocol), Ok(transport)) => {
                prop_assert_eq!(transport.protocol(), protocol);
                prop_assert_eq!(transport.trust_anchors(), 1);
            }
            (None, Err(err)) => {
                prop_assert!(err.to_string().contains("no supported TLS protocol available"));
            }
            (expected, result) => {
                return Err(TestCaseError::fail(format!(
                    "expected {:?}, got {:?}",
                    expected,
                    result.map(|t| t.protocol())
                )));
            }
        }
    }
}

proptest! {
    // scrypt at N = 2^14 is deliberately slow.
    #![proptest_config(ProptestConfig::with_cases(4))]

    /// Property: derivation is deterministic for a (passphrase, account) pair.
    #[test]
    fn proptest_derivation_is_deterministic(
        passphrase in "[ -~]{1,32}",
        account in "[a-z0-9]{1,16}",
    ) {
        let pass = Passphrase::from_string(passphrase);

        let first = CredentialDeriver.derive(&pass, &account).unwrap();
        let second = CredentialDeriver.derive(&pass, &account).unwrap();

        prop_assert_eq!(first.bytes(), second.bytes());
        prop_assert_eq!(first.bytes().len(), 127);
        prop_assert!(first.matches(&pass, &account).unwrap());
    }
}

#[test]
fn empty_role_set_is_never_allowed() {
    let table = AccessTable::defaults();
    for requirement in table.iter() {
        let decision = authorize(requirement.operation, requirement, &BTreeSet::new());
        assert_eq!(decision, Decision::Deny(StatusCode::FORBIDDEN));
    }
}
