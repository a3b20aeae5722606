use std::ffi::OsString;

use ena_webin_cli::{ClassifiedArguments, LaunchEnv, LauncherConfig};
use proptest::prelude::*;

fn token() -> impl Strategy<Value = String> {
    prop_oneof![
        "-D[a-z.]{1,8}=[a-z0-9]{0,4}",
        "-XX:[+-][A-Za-z]{1,8}",
        "-Xm[sxn][0-9]{1,2}[gm]",
        "--exec_dir=[a-z/]{1,8}",
        "-{0,2}[a-z0-9_]{0,8}",
    ]
}

fn is_property(token: &str) -> bool {
    token.starts_with("-D") || token.starts_with("-XX")
}

fn selected(tokens: &[String], keep: impl Fn(&str) -> bool) -> Vec<OsString> {
    tokens
        .iter()
        .filter(|token| keep(token))
        .map(OsString::from)
        .collect()
}

proptest! {
    #[test]
    fn every_token_lands_in_one_bucket(tokens in prop::collection::vec(token(), 0..24)) {
        let arguments = ClassifiedArguments::classify(tokens.clone());

        let total = arguments.memory_options().len()
            + arguments.property_options().len()
            + arguments.pass_through().len()
            + arguments.exec_dirs().len();
        prop_assert_eq!(total, tokens.len());
    }

    #[test]
    fn buckets_preserve_input_order(tokens in prop::collection::vec(token(), 0..24)) {
        let arguments = ClassifiedArguments::classify(tokens.clone());

        let properties = selected(&tokens, is_property);
        let memory = selected(&tokens, |t| !is_property(t) && t.starts_with("-Xm"));
        let pass_through = selected(&tokens, |t| {
            !is_property(t) && !t.starts_with("-Xm") && !t.starts_with("--exec_dir=")
        });

        prop_assert_eq!(arguments.property_options(), properties.as_slice());
        prop_assert_eq!(arguments.memory_options(), memory.as_slice());
        prop_assert_eq!(arguments.pass_through(), pass_through.as_slice());
    }

    #[test]
    fn defaults_follow_options_variable(
        tokens in prop::collection::vec(token(), 0..12),
        options in prop::option::of("[a-zA-Z ]{0,6}"),
    ) {
        let mut arguments = ClassifiedArguments::classify(tokens.clone());
        let had_memory = !arguments.memory_options().is_empty();
        let env = LaunchEnv {
            runtime_options: options.clone().map(Into::into),
            ..LaunchEnv::default()
        };

        let applied = arguments.apply_default_memory_options(&LauncherConfig::default().default_mem_opts, &env);

        prop_assert_eq!(applied, !had_memory && options.is_none());
        if applied {
            prop_assert_eq!(arguments.memory_options(), ["-Xms2g", "-Xmx4g"]);
        }
    }
}
