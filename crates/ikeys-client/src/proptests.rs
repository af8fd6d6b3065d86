#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::config::ClientConfig;
    use crate::resolver::Application;

    proptest! {
        #[test]
        fn prop_key_pair_url_embeds_id(
            id in "[0-9a-f]{32}",
            trailing_slash in any::<bool>(),
            leading_slash in any::<bool>(),
        ) {
            let mut config = ClientConfig::default();
            config.keys_base_url = if trailing_slash {
                "https://keys.example.test/".into()
            } else {
                "https://keys.example.test".into()
            };
            if leading_slash {
                config.key_pair_endpoint = "/api/key/{key_pair_id}/".into();
            }
            prop_assert_eq!(
                config.key_pair_url(&id),
                format!("https://keys.example.test/api/key/{id}/")
            );
        }

        #[test]
        fn prop_is_in_list_matches_membership(
            ids in prop::collection::vec("[a-z]{1,6}", 0..8),
            candidate in "[a-z]{1,6}",
        ) {
            let app = Application {
                id: candidate.clone(),
                name: String::new(),
                description: None,
                internal: None,
            };
            prop_assert_eq!(app.is_in_list(ids.as_slice()), ids.contains(&candidate));
        }
    }
}
