//! Loading deployment files and deploying the applications they declare.

use std::io::Write;

use php_appserver::container::SessionProxy;
use php_appserver::deployment::{deploy, deploy_all, DeploymentFile};
use php_appserver::epb::RegistrationOutcome;
use php_appserver::{NamingError, RequestContext};

const SHOP: &str = r#"
applications:
  - name: shop
    unique_name: shop-1
    resources:
      DataSource: mysql://localhost/shop
    beans:
      - name: CartBean
        class_name: App\Cart
        session_type: stateful
        methods: [add, checkout]
      - name: Catalog
        class_name: App\Catalog
    persistence_units: [ShopUnit]
    references:
      epb_references:
        - ref_name: Cart
          bean_name: CartBean
          bean_interface: CartBeanLocal
        - ref_name: broken
      res_references:
        - ref_name: db
          type: DataSource
      bean_references:
        - ref_name: catalog
          bean_name: Catalog
      persistence_unit_references:
        - ref_name: em
          unit_name: ShopUnit
  - name: blog
"#;

fn shop_file() -> DeploymentFile {
    DeploymentFile::from_yaml(SHOP).unwrap()
}

#[test]
fn test_load_reads_yaml_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SHOP.as_bytes()).unwrap();

    let loaded = DeploymentFile::load(file.path()).unwrap();
    assert_eq!(loaded.applications.len(), 2);
    assert_eq!(loaded.applications[0].unique_name(), "shop-1");
    assert_eq!(loaded.applications[1].unique_name(), "blog");
    assert_eq!(loaded.applications[0].references.len(), 5);
}

#[test]
fn test_load_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let err = DeploymentFile::load(dir.path().join("absent.yaml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read deployment file"));
}

#[test]
fn test_duplicate_and_blank_names_are_rejected() {
    let duplicate = "applications:\n  - name: a\n  - name: a\n";
    assert!(DeploymentFile::from_yaml(duplicate).is_err());

    let clashing_unique = "applications:\n  - name: a\n  - name: b\n    unique_name: a\n";
    assert!(DeploymentFile::from_yaml(clashing_unique).is_err());

    let blank = "applications:\n  - name: ' '\n";
    assert!(DeploymentFile::from_yaml(blank).is_err());
}

#[test]
fn test_deploy_binds_resources_and_references() {
    let file = shop_file();
    let deployment = deploy(&file.applications[0]).unwrap();
    let app = &deployment.application;

    assert_eq!(deployment.report.bound(), 4);
    assert!(matches!(
        deployment.report.outcome("php:global/shop-1/broken"),
        Some(RegistrationOutcome::Misconfigured(_))
    ));

    assert_eq!(
        app.lookup("php:global/shop-1/db", None).unwrap().as_literal(),
        Some("mysql://localhost/shop")
    );
    assert_eq!(
        app.naming_directory().list("php:global/shop-1").unwrap(),
        vec!["Cart", "DataSource", "catalog", "db", "em"]
    );

    let request = RequestContext::with_session("alice");
    let cart = app.lookup("php:global/shop-1/Cart", Some(&request)).unwrap();
    let proxy = cart.downcast_ref::<SessionProxy>().unwrap();
    assert_eq!(proxy.instance().bean_name(), "CartBean");
}

#[test]
fn test_redeploying_references_is_idempotent() {
    let file = shop_file();
    let descriptor = &file.applications[0];
    let deployment = deploy(descriptor).unwrap();
    let before = deployment.application.naming_directory().bindings().len();

    let report = deployment.redeploy_references(&descriptor.references);
    assert_eq!(report.bound(), 0);
    assert_eq!(
        report.outcome("php:global/shop-1/Cart"),
        Some(&RegistrationOutcome::AlreadyBound)
    );
    assert_eq!(deployment.application.naming_directory().bindings().len(), before);
}

#[test]
fn test_undeploy_removes_the_application_context_and_instances() {
    let deployments = deploy_all(&shop_file()).unwrap();
    assert_eq!(deployments.len(), 2);

    let shop = &deployments[0];
    shop.application
        .lookup("php:global/shop-1/Cart", Some(&RequestContext::with_session("alice")))
        .unwrap();
    assert_eq!(shop.container.stats()["session_instances"], 1);

    shop.undeploy().unwrap();
    assert_eq!(
        shop.application.lookup("php:global/shop-1/db", None).unwrap_err(),
        NamingError::NotBound("php:global/shop-1/db".into())
    );
    assert_eq!(shop.container.stats()["session_instances"], 0);
    assert_eq!(shop.container.stats()["shared_instances"], 0);

    // nothing was bound for blog, undeploying it is still fine
    deployments[1].undeploy().unwrap();
}

#[test]
fn test_max_sessions_caps_stateful_instances() {
    let yaml = r#"
applications:
  - name: shop
    max_sessions: 1
    beans:
      - name: CartBean
        class_name: App\Cart
        session_type: stateful
    references:
      epb_references:
        - ref_name: Cart
          bean_name: CartBean
          bean_interface: CartBeanLocal
"#;
    let file = DeploymentFile::from_yaml(yaml).unwrap();
    let deployment = deploy(&file.applications[0]).unwrap();

    for session in ["alice", "bob", "carol"] {
        deployment
            .application
            .lookup("php:global/shop/Cart", Some(&RequestContext::with_session(session)))
            .unwrap();
    }
    assert_eq!(deployment.container.stats()["session_instances"], 1);
}
