//! Property-based checks over group size and seed.

use proptest::prelude::*;
use sealroom_harness::TestCluster;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Every participant reads every message, whoever started the
    /// conversation and whoever sent.
    #[test]
    fn every_member_reads_every_message(seed in any::<u64>(), size in 1usize..6, initiator in 0usize..6) {
        let initiator = initiator % size;
        let names: Vec<String> = (0..size).map(|i| format!("p{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        let (histories, blob_count) = runtime().block_on(async {
            let cluster = TestCluster::published(seed, &names).await.unwrap();
            let conversation = cluster
                .party(initiator)
                .start_conversation(&cluster.others(initiator))
                .await
                .unwrap();

            for party in cluster.parties() {
                let text = format!("hi from {}", party.local_participant());
                party.send_message(&text, &conversation).await.unwrap();
            }

            let mut histories = Vec::new();
            for party in cluster.parties() {
                histories.push(party.history(&conversation).await.unwrap());
            }
            (histories, conversation.encrypted_thread_keys.len())
        });

        let expected: Vec<String> = names.iter().map(|name| format!("hi from {name}")).collect();
        prop_assert_eq!(blob_count, size);
        for history in histories {
            prop_assert_eq!(history.dropped, 0);
            let texts: Vec<String> = history.messages.into_iter().map(|m| m.text).collect();
            prop_assert_eq!(&texts, &expected);
        }
    }

    /// Listing participants twice or including oneself never changes the
    /// blob set.
    #[test]
    fn participant_list_is_deduplicated(seed in any::<u64>(), repeats in 1usize..4) {
        let blobs = runtime().block_on(async {
            let cluster = TestCluster::published(seed, &["alice", "bob", "carol"]).await.unwrap();
            let mut list = Vec::new();
            for _ in 0..repeats {
                list.extend(cluster.others(0));
                list.push(cluster.party(0).local_participant().clone());
            }
            let conversation = cluster.party(0).start_conversation(&list).await.unwrap();
            conversation.participants().map(|p| p.as_str().to_string()).collect::<Vec<_>>()
        });

        prop_assert_eq!(blobs, vec!["alice", "bob", "carol"]);
    }
}
