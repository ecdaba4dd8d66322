//! Data Resource, Data Package and Profile tests

use std::path::Path;

use data_package_sdk::{
    Error, Package, PackageOptions, Profile, Resource, ResourceIterOptions, ResourceOptions, Row,
    Value,
};
use serde_json::json;

fn write_package(dir: &Path, people: &str) {
    std::fs::create_dir_all(dir.join("data")).unwrap();
    std::fs::write(dir.join("data/people.csv"), people).unwrap();
    std::fs::write(
        dir.join("data/countries.csv"),
        "code,name\nde,Germany\nfr,France\n",
    )
    .unwrap();
    std::fs::write(
        dir.join("country.schema.json"),
        r#"{"fields": [{"name": "code"}, {"name": "name"}], "primaryKey": "code"}"#,
    )
    .unwrap();
    let descriptor = json!({
        "name": "people",
        "profile": "tabular-data-package",
        "resources": [
            {
                "name": "countries",
                "profile": "tabular-data-resource",
                "path": "data/countries.csv",
                "schema": "country.schema.json",
            },
            {
                "name": "people",
                "profile": "tabular-data-resource",
                "path": "data/people.csv",
                "schema": {
                    "fields": [
                        {"name": "id", "type": "integer"},
                        {"name": "name"},
                        {"name": "country"},
                        {"name": "manager", "type": "integer"},
                    ],
                    "primaryKey": "id",
                    "foreignKeys": [
                        {"fields": "country", "reference": {"resource": "countries", "fields": "code"}},
                        {"fields": "manager", "reference": {"resource": "", "fields": "id"}},
                    ],
                },
            },
        ],
    });
    std::fs::write(
        dir.join("datapackage.json"),
        serde_json::to_string_pretty(&descriptor).unwrap(),
    )
    .unwrap();
}

const PEOPLE: &str = "id,name,country,manager\n1,Ann,de,\n2,Bob,fr,1\n3,Cid,de,1\n";

mod package_tests {
    use super::*;

    #[tokio::test]
    async fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), PEOPLE);

        let package = Package::load(
            dir.path().join("datapackage.json"),
            PackageOptions {
                strict: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(package.valid());
        assert_eq!(package.name(), Some("people"));
        assert_eq!(package.profile().name(), "tabular-data-package");
        assert_eq!(package.resource_names(), vec!["countries", "people"]);

        let countries = package.get_resource("countries").unwrap();
        assert!(countries.local());
        assert!(countries.tabular());
        assert_eq!(countries.schema().unwrap().primary_key(), &["code".to_string()]);
        assert_eq!(
            countries.headers().await.unwrap(),
            Some(vec!["code".to_string(), "name".to_string()])
        );
    }

    #[tokio::test]
    async fn test_check_relations_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), PEOPLE);
        let package = Package::load(dir.path().join("datapackage.json"), PackageOptions::default())
            .await
            .unwrap();
        assert!(package.check_relations().await.unwrap());

        let rows = package
            .get_resource("people")
            .unwrap()
            .read(
                ResourceIterOptions {
                    keyed: true,
                    relations: true,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        let bob = rows[1].as_keyed().unwrap();
        match (bob.get("country"), bob.get("manager")) {
            (Some(Value::Object(country)), Some(Value::Object(manager))) => {
                assert_eq!(country["name"], json!("France"));
                assert_eq!(manager["name"], json!("Ann"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_check_relations_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), "id,name,country,manager\n1,Ann,de,\n2,Bob,es,1\n");
        let package = Package::load(dir.path().join("datapackage.json"), PackageOptions::default())
            .await
            .unwrap();

        let error = package.check_relations().await.unwrap_err();
        assert!(error.is_relation());
        assert_eq!(error.row_number(), Some(3));

        let rows = package
            .get_resource("people")
            .unwrap()
            .read(
                ResourceIterOptions {
                    relations: true,
                    force_cast: true,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(matches!(rows[1], Row::Invalid { row_number: 3, .. }));
    }

    #[tokio::test]
    async fn test_broken_self_reference() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), "id,name,country,manager\n1,Ann,de,7\n");
        let package = Package::load(dir.path().join("datapackage.json"), PackageOptions::default())
            .await
            .unwrap();
        assert!(package.check_relations().await.unwrap_err().is_relation());
    }

    #[tokio::test]
    async fn test_zip_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), PEOPLE);
        let package = Package::load(dir.path().join("datapackage.json"), PackageOptions::default())
            .await
            .unwrap();

        let out = tempfile::tempdir().unwrap();
        let bundle = out.path().join("people.zip");
        package.save(&bundle).await.unwrap();

        let reloaded = Package::load(bundle.as_path(), PackageOptions::default()).await.unwrap();
        assert!(reloaded.valid());
        assert_eq!(reloaded.resource_names(), vec!["countries", "people"]);
        let rows = reloaded
            .get_resource("people")
            .unwrap()
            .read(ResourceIterOptions::default(), None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert!(reloaded.check_relations().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let result = Package::load(dir.path().join("datapackage.json"), PackageOptions::default()).await;
        assert!(matches!(result, Err(Error::Descriptor(_))));
    }

    #[tokio::test]
    async fn test_unsafe_resource_path_is_not_read() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("secret.csv"), "token\nTOP-SECRET\n").unwrap();
        let package_dir = dir.path().join("pkg");
        std::fs::create_dir(&package_dir).unwrap();
        std::fs::write(
            package_dir.join("datapackage.json"),
            r#"{"name": "leak", "resources": [{"name": "secret", "path": "../secret.csv"}]}"#,
        )
        .unwrap();

        let package = Package::load(package_dir.join("datapackage.json"), PackageOptions::default())
            .await
            .unwrap();
        assert!(!package.valid());
        let secret = package.get_resource("secret").unwrap();
        assert!(secret.raw_read().await.is_err());
        assert!(secret.read(ResourceIterOptions::default(), None).await.is_err());
    }

    #[test]
    fn test_lenient_remote_resource_profile() {
        let descriptor = json!({
            "name": "remote-profile",
            "resources": [
                {"name": "r", "profile": "https://example.com/profile.json", "data": [["a"], [1]]},
            ],
        });
        let package = Package::from_descriptor(descriptor.clone(), PackageOptions::default()).unwrap();
        assert!(!package.valid());
        assert_eq!(package.errors().len(), 1);

        let strict = Package::from_descriptor(
            descriptor,
            PackageOptions {
                strict: true,
                ..Default::default()
            },
        );
        assert!(strict.is_err());
    }

    #[test]
    fn test_lenient_collects_errors() {
        let package = Package::from_descriptor(
            json!({"name": "Not Valid", "resources": [{"name": "r", "data": [["a"]]}]}),
            PackageOptions::default(),
        )
        .unwrap();
        assert!(!package.valid());
        assert_eq!(package.errors().len(), 1);

        let strict = Package::from_descriptor(
            json!({"name": "Not Valid", "resources": [{"name": "r", "data": [["a"]]}]}),
            PackageOptions {
                strict: true,
                ..Default::default()
            },
        );
        assert!(matches!(strict, Err(Error::Validation(_))));
    }
}

mod resource_tests {
    use super::*;

    #[tokio::test]
    async fn test_load_resource_descriptor_file() {
        let dir = tempfile::tempdir().unwrap();
        write_package(dir.path(), PEOPLE);
        std::fs::write(
            dir.path().join("countries.resource.json"),
            r#"{"name": "countries", "path": "data/countries.csv", "schema": "country.schema.json"}"#,
        )
        .unwrap();

        let resource = Resource::load(dir.path().join("countries.resource.json"), ResourceOptions::default())
            .await
            .unwrap();
        assert!(resource.valid());
        assert_eq!(resource.descriptor()["schema"]["primaryKey"], json!("code"));
        let rows = resource
            .read(
                ResourceIterOptions {
                    extended: true,
                    ..Default::default()
                },
                Some(1),
            )
            .await
            .unwrap();
        assert_eq!(rows[0].to_json(), json!([2, ["code", "name"], ["de", "Germany"]]));
    }

    #[test]
    fn test_lenient_remote_profile() {
        let resource = Resource::from_descriptor(
            json!({"name": "r", "profile": "https://example.com/profile.json", "path": "data.csv"}),
            ResourceOptions::default(),
        )
        .unwrap();
        assert!(!resource.valid());
        assert!(resource.local());
    }

    #[tokio::test]
    async fn test_unsafe_schema_reference() {
        let result = Resource::load(
            json!({"name": "r", "path": "data.csv", "schema": "../schema.json"}),
            ResourceOptions::default(),
        )
        .await;
        assert!(matches!(result, Err(Error::Descriptor(_))));
    }
}

mod profile_tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_profile_validates_without_mutation() {
        let profile = Profile::load("data-package").await.unwrap();
        let descriptor = json!({"resources": [{"name": "r", "path": "data.csv"}]});
        let report = profile.validate(&descriptor);
        assert!(report.valid);
        assert_eq!(descriptor, json!({"resources": [{"name": "r", "path": "data.csv"}]}));

        let report = profile.validate(&json!({"resources": []}));
        assert!(!report.valid);
        assert!(report.into_result().is_err());
    }
}
