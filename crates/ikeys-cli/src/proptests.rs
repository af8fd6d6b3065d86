#[cfg(test)]
mod tests {
    use clap::Parser;
    use ikeys_client::ClientConfig;
    use ikeys_crypto::PrivateKey;
    use proptest::prelude::*;

    use crate::{Cli, ExitCode};

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_cli_sign_verify_round_trip(
            message in "[ -~]{0,64}",
            legacy in any::<bool>(),
        ) {
            let key = PrivateKey::generate();
            let mut config = ClientConfig::default();
            config.private_key = Some(key.to_base64().unwrap().into());
            let public = key.public_key().to_base64();
            let version = if legacy { "1.0" } else { "1.2" };
            // `=` form so messages starting with '-' are not read as flags
            let message_arg = format!("--message={message}");
            let rt = runtime();

            let signed = rt.block_on(
                Cli::try_parse_from(["ikeys", "sign", message_arg.as_str(), "--version", version])
                    .unwrap()
                    .run(config),
            ).unwrap();

            let verified = rt.block_on(
                Cli::try_parse_from([
                    "ikeys", "verify",
                    message_arg.as_str(),
                    "--signature", signed.text.as_str(),
                    "--public-key", public.as_str(),
                ])
                .unwrap()
                .run(ClientConfig::default()),
            ).unwrap();
            prop_assert_eq!(verified.code, ExitCode::Success);
        }
    }
}
