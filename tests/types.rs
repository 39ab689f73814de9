// ABOUTME: Integration tests for environments, deployment tags, and image references.
// ABOUTME: Property tests check parsing never accepts anything outside the closed sets.

use lakeship::types::*;
use proptest::prelude::*;

mod environment_tests {
    use super::*;

    #[test]
    fn display_round_trips_through_parse() {
        for env in Environment::ALL {
            assert_eq!(env.to_string().parse::<Environment>().unwrap(), env);
        }
    }

    #[test]
    fn parsing_is_case_sensitive() {
        assert!("Production".parse::<Environment>().is_err());
        assert!("prod".parse::<Environment>().is_err());
    }

    #[test]
    fn only_production_is_production() {
        let prod: Vec<Environment> = Environment::ALL
            .into_iter()
            .filter(Environment::is_production)
            .collect();
        assert_eq!(prod, vec![Environment::Production]);
    }

    #[test]
    fn invalid_environment_names_the_input() {
        let err = "qa".parse::<Environment>().unwrap_err();
        assert!(err.to_string().contains("'qa'"));
        assert!(err.to_string().contains("dev, staging, production"));
    }

    #[test]
    fn default_targets_are_distinct() {
        let registries: std::collections::HashSet<String> = Environment::ALL
            .iter()
            .map(|e| e.default_targets().registry_name)
            .collect();
        assert_eq!(registries.len(), 3);
    }

    proptest! {
        #[test]
        fn parse_accepts_only_the_three_names(s in "\\PC{0,16}") {
            let parsed = s.parse::<Environment>();
            let known = matches!(s.as_str(), "dev" | "staging" | "production");
            prop_assert_eq!(parsed.is_ok(), known);
        }
    }
}

mod deployment_tag_tests {
    use super::*;

    #[test]
    fn manual_tags_are_valid_tags() {
        let tag = DeploymentTag::manual(chrono::Utc::now());
        assert!(tag.as_str().starts_with("manual-"));
        assert!(DeploymentTag::new(tag.as_str()).is_ok());
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let tag = DeploymentTag::new("  abc1234\n").unwrap();
        assert_eq!(tag.as_str(), "abc1234");
    }

    #[test]
    fn rejects_registry_separators() {
        assert!(matches!(
            DeploymentTag::new("v1:2"),
            Err(DeploymentTagError::InvalidChar(':'))
        ));
        assert!(matches!(
            DeploymentTag::new("feature/x"),
            Err(DeploymentTagError::InvalidChar('/'))
        ));
    }

    proptest! {
        #[test]
        fn valid_tags_are_kept_verbatim(s in "[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}") {
            let tag = DeploymentTag::new(&s).unwrap();
            prop_assert_eq!(tag.as_str(), s.as_str());
        }
    }
}

mod image_ref_tests {
    use super::*;

    #[test]
    fn formats_registry_repository_and_tag() {
        let image = ImageRef::new("acretldev001.azurecr.io", "etl-dbt", "abc1234");
        assert_eq!(image.to_string(), "acretldev001.azurecr.io/etl-dbt:abc1234");
        assert_eq!(
            image.with_tag("latest").to_string(),
            "acretldev001.azurecr.io/etl-dbt:latest"
        );
    }

    #[test]
    fn parse_splits_registry_with_port() {
        let image = ImageRef::parse("localhost:5000/etl-ingestion:v2").unwrap();
        assert_eq!(image.registry(), Some("localhost:5000"));
        assert_eq!(image.repository(), "etl-ingestion");
        assert_eq!(image.tag(), "v2");
    }

    #[test]
    fn parse_defaults_tag() {
        let image = ImageRef::parse("etl-ingestion").unwrap();
        assert!(image.registry().is_none());
        assert_eq!(image.tag(), "latest");
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!(ImageRef::parse(""), Err(ParseImageRefError::Empty)));
        assert!(matches!(
            ImageRef::parse("etl ingestion"),
            Err(ParseImageRefError::InvalidChar(' '))
        ));
        assert!(ImageRef::parse("etl-ingestion:").is_err());
    }
}
