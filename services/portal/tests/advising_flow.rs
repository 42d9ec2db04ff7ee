mod support;

use std::collections::BTreeSet;
use tokio_test::assert_ok;

use portal::error::PortalError;
use portal::models::{AdvisingStatus, CourseStatus};
use portal::repositories::AccountStore;
use portal::services::PlanSubmission;
use support::Harness;

fn plan(email: &str, form_id: Option<i64>, courses: &[&str]) -> PlanSubmission {
    PlanSubmission {
        form_id,
        email: email.to_string(),
        current_term: "Fall2025".to_string(),
        last_term: Some("Spring2025".to_string()),
        last_gpa: Some("3.4".to_string()),
        selected_courses: courses.iter().map(|c| c.to_string()).collect(),
    }
}

async fn planned_names(h: &Harness, form_id: i64) -> BTreeSet<String> {
    h.advising
        .get_form(form_id)
        .await
        .unwrap()
        .courses
        .into_iter()
        .filter(|c| c.status == CourseStatus::Planned)
        .map(|c| c.course_name)
        .collect()
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_create_then_update_replaces_planned_courses() {
    let h = Harness::new();
    h.register("a@x.com").await;

    let id = h.advising.save_form(plan("a@x.com", None, &["CS101"])).await.unwrap();
    let detail = h.advising.get_form(id).await.unwrap();
    assert_eq!(detail.record.status, AdvisingStatus::Pending);
    assert_eq!(planned_names(&h, id).await, names(&["CS101"]));

    let same_id = h
        .advising
        .save_form(plan("a@x.com", Some(id), &["CS101", "CS102"]))
        .await
        .unwrap();
    assert_eq!(same_id, id);
    assert_eq!(planned_names(&h, id).await, names(&["CS101", "CS102"]));
}

#[tokio::test]
async fn test_saving_same_selection_twice_leaves_no_duplicates() {
    let h = Harness::new();
    h.register("a@x.com").await;

    let id = h
        .advising
        .save_form(plan("a@x.com", None, &["CS101", "MATH211"]))
        .await
        .unwrap();
    h.advising
        .save_form(plan("a@x.com", Some(id), &["CS101", "MATH211"]))
        .await
        .unwrap();

    let detail = h.advising.get_form(id).await.unwrap();
    assert_eq!(detail.courses.len(), 2);
    assert_eq!(planned_names(&h, id).await, names(&["CS101", "MATH211"]));
}

#[tokio::test]
async fn test_duplicate_names_in_one_selection_are_collapsed() {
    let h = Harness::new();
    h.register("a@x.com").await;

    let id = h
        .advising
        .save_form(plan("a@x.com", None, &["CS 101", "cs 101", "CS 102"]))
        .await
        .unwrap();

    assert_eq!(planned_names(&h, id).await, names(&["CS 101", "CS 102"]));
}

#[tokio::test]
async fn test_decided_record_is_locked() {
    let h = Harness::new();
    h.register("a@x.com").await;

    let id = h.advising.save_form(plan("a@x.com", None, &["CS101"])).await.unwrap();
    assert_ok!(
        h.advising
            .decide(id, AdvisingStatus::Rejected, Some("Take CS150 first"))
            .await
    );

    let result = h
        .advising
        .save_form(plan("a@x.com", Some(id), &["CS999"]))
        .await;
    assert!(matches!(result, Err(PortalError::Locked(_))));

    let detail = h.advising.get_form(id).await.unwrap();
    assert_eq!(detail.record.status, AdvisingStatus::Rejected);
    assert_eq!(detail.record.advisor_message.as_deref(), Some("Take CS150 first"));
    assert_eq!(planned_names(&h, id).await, names(&["CS101"]));
}

#[tokio::test]
async fn test_completed_course_rejects_whole_save() {
    let h = Harness::new();
    h.register("a@x.com").await;
    let account = h.accounts.find_by_email("a@x.com").await.unwrap().unwrap();
    h.advising_store
        .add_taken_course(account.id, "CS 250 \u{2013} Problem Solving", "Spring2025", Some("A"))
        .await;

    let id = h.advising.save_form(plan("a@x.com", None, &["CS101"])).await.unwrap();

    let result = h
        .advising
        .save_form(plan(
            "a@x.com",
            Some(id),
            &["CS102", "cs 250 - problem solving"],
        ))
        .await;
    match result {
        Err(PortalError::Conflict(message)) => {
            assert!(message.contains("cs 250 - problem solving"))
        }
        other => panic!("expected conflict, got {:?}", other),
    }

    assert_eq!(planned_names(&h, id).await, names(&["CS101"]));
}

#[tokio::test]
async fn test_completed_rows_on_records_count_as_taken() {
    let h = Harness::new();
    h.register("a@x.com").await;

    let id = h.advising.save_form(plan("a@x.com", None, &["CS101"])).await.unwrap();
    h.advising_store
        .add_course(id, "MATH 163", CourseStatus::Completed)
        .await
        .unwrap();
    h.advising_store
        .add_course(id, "ENGL 110", CourseStatus::Current)
        .await
        .unwrap();

    assert_eq!(
        h.advising.taken_courses("a@x.com").await.unwrap(),
        vec!["MATH 163".to_string()]
    );
    assert_eq!(
        h.advising.current_courses("a@x.com").await.unwrap(),
        vec!["ENGL 110".to_string()]
    );

    let result = h.advising.save_form(plan("a@x.com", None, &["math 163"])).await;
    assert!(matches!(result, Err(PortalError::Conflict(_))));

    // Saving replaces only the planned subset
    h.advising
        .save_form(plan("a@x.com", Some(id), &["CS102"]))
        .await
        .unwrap();
    let detail = h.advising.get_form(id).await.unwrap();
    assert_eq!(detail.courses.len(), 3);
}

#[tokio::test]
async fn test_reads_soft_fail_for_unknown_account() {
    let h = Harness::new();

    assert!(h.advising.current_courses("nobody@x.com").await.unwrap().is_empty());
    assert!(h.advising.taken_courses("nobody@x.com").await.unwrap().is_empty());
    assert!(h.advising.list_forms("nobody@x.com").await.unwrap().is_empty());
    assert!(h.advising.summary("nobody@x.com").await.unwrap().is_none());
    assert!(h.advising.history("nobody@x.com").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_save_for_unknown_account_is_validation_error() {
    let h = Harness::new();
    let result = h.advising.save_form(plan("nobody@x.com", None, &["CS101"])).await;
    assert!(matches!(result, Err(PortalError::Validation(_))));
}

#[tokio::test]
async fn test_save_against_foreign_or_missing_record_is_not_found() {
    let h = Harness::new();
    h.register("a@x.com").await;
    h.register("b@x.com").await;

    let id = h.advising.save_form(plan("a@x.com", None, &["CS101"])).await.unwrap();

    let foreign = h.advising.save_form(plan("b@x.com", Some(id), &["CS102"])).await;
    assert!(matches!(foreign, Err(PortalError::NotFound(_))));

    let missing = h.advising.save_form(plan("a@x.com", Some(9999), &[])).await;
    assert!(matches!(missing, Err(PortalError::NotFound(_))));
}

#[tokio::test]
async fn test_get_unknown_form_is_not_found() {
    let h = Harness::new();
    let result = h.advising.get_form(42).await;
    assert!(matches!(result, Err(PortalError::NotFound(_))));
}

#[tokio::test]
async fn test_forms_are_listed_newest_first() {
    let h = Harness::new();
    h.register("a@x.com").await;

    let first = h.advising.save_form(plan("a@x.com", None, &["CS101"])).await.unwrap();
    let second = h.advising.save_form(plan("a@x.com", None, &["CS102"])).await.unwrap();

    let forms = h.advising.list_forms("a@x.com").await.unwrap();
    let ids: Vec<i64> = forms.iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![second, first]);

    let summary = h.advising.summary("a@x.com").await.unwrap().unwrap();
    assert_eq!(summary.id, second);
    assert_eq!(summary.last_gpa.as_deref(), Some("3.4"));
}

#[tokio::test]
async fn test_decide_notifies_owner() {
    let h = Harness::new();
    h.register("a@x.com").await;
    let id = h.advising.save_form(plan("a@x.com", None, &["CS101"])).await.unwrap();

    h.advising
        .decide(id, AdvisingStatus::Approved, None)
        .await
        .unwrap();

    let emails = h.emails_to("a@x.com", 2).await;
    let status = emails
        .iter()
        .find(|e| e.subject == "Advising Plan Approved")
        .expect("status email sent");
    assert!(status.html.contains("Fall2025"));
    assert!(status.html.contains("No feedback provided."));
}

#[tokio::test]
async fn test_decide_rejects_pending_and_unknown_record() {
    let h = Harness::new();
    h.register("a@x.com").await;
    let id = h.advising.save_form(plan("a@x.com", None, &["CS101"])).await.unwrap();

    let pending = h.advising.decide(id, AdvisingStatus::Pending, None).await;
    assert!(matches!(pending, Err(PortalError::Validation(_))));

    let unknown = h.advising.decide(9999, AdvisingStatus::Approved, None).await;
    assert!(matches!(unknown, Err(PortalError::NotFound(_))));
}

#[tokio::test]
async fn test_sync_approved_feeds_taken_ledger() {
    let h = Harness::new();
    h.register("a@x.com").await;

    let approved = h
        .advising
        .save_form(plan("a@x.com", None, &["CS101", "CS102"]))
        .await
        .unwrap();
    let pending = h.advising.save_form(plan("a@x.com", None, &["CS200"])).await.unwrap();
    h.advising
        .decide(approved, AdvisingStatus::Approved, Some("Looks good"))
        .await
        .unwrap();

    assert_eq!(h.advising.sync_approved().await.unwrap(), 2);
    assert_eq!(h.advising.sync_approved().await.unwrap(), 0);

    let last = h.advising.last_courses("a@x.com", "Fall2025").await.unwrap();
    let synced: Vec<&str> = last.iter().map(|c| c.course_name.as_str()).collect();
    assert_eq!(synced, vec!["CS101", "CS102"]);

    // Synced courses now block re-selection
    let result = h
        .advising
        .save_form(plan("a@x.com", Some(pending), &["cs101"]))
        .await;
    assert!(matches!(result, Err(PortalError::Conflict(_))));
}

#[tokio::test]
async fn test_last_courses_requires_email_and_term() {
    let h = Harness::new();
    let result = h.advising.last_courses("a@x.com", " ").await;
    assert!(matches!(result, Err(PortalError::Validation(_))));
}

#[tokio::test]
async fn test_history_lists_courses_per_record() {
    let h = Harness::new();
    h.register("a@x.com").await;
    let id = h
        .advising
        .save_form(plan("a@x.com", None, &["CS102", "CS101"]))
        .await
        .unwrap();

    let history = h.advising.history("a@x.com").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].record.id, id);
    assert_eq!(history[0].courses, vec!["CS101", "CS102"]);
}
