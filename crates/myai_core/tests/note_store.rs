use myai_core::db::open_db_in_memory;
use myai_core::{ImportError, Note, NotePatch, NoteRepository, NoteService, SqliteNoteRepository};

#[test]
fn update_sets_field_and_strictly_increases_updated_at() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));

    let created = service.create_note().unwrap();
    assert_eq!(created.title, "Untitled Note");
    assert_eq!(created.content, "");

    let mut previous = created.updated_at;
    for text in ["first", "second", "third"] {
        let updated = service
            .update_note(&created.id, &NotePatch::new().content(text))
            .unwrap();
        assert_eq!(updated.content, text);
        assert!(updated.updated_at > previous);
        previous = updated.updated_at;
    }
    assert_eq!(service.get_note(&created.id).unwrap().unwrap().content, "third");
}

#[test]
fn list_is_ordered_by_recency_and_delete_is_terminal() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::new(&conn);
    repo.insert_note(&Note::with_id("older", 1_000)).unwrap();
    repo.insert_note(&Note::with_id("newer", 2_000)).unwrap();
    let service = NoteService::new(repo);

    let ids = |service: &NoteService<SqliteNoteRepository<'_>>| -> Vec<String> {
        service
            .list_sorted_by_recency()
            .unwrap()
            .into_iter()
            .map(|note| note.id)
            .collect()
    };
    assert_eq!(ids(&service), vec!["newer", "older"]);

    service
        .update_note("older", &NotePatch::new().title("touched"))
        .unwrap();
    assert_eq!(ids(&service), vec!["older", "newer"]);

    assert!(service.delete_note("older").unwrap());
    assert!(!service.delete_note("older").unwrap());
    assert!(service.get_note("older").unwrap().is_none());
}

#[test]
fn merge_import_keeps_existing_note_and_reports_input_length() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteNoteRepository::new(&conn);
    let mut existing = Note::with_id("a", 1_000);
    existing.title = "Mine".to_string();
    existing.content = "original body".to_string();
    repo.insert_note(&existing).unwrap();
    let service = NoteService::new(repo);

    let summary = service
        .import_all(r#"[{"id":"a","title":"T"}]"#, true)
        .unwrap();

    assert_eq!(summary.count, 1);
    assert_eq!(summary.inserted, 0);
    let stored = service.get_note("a").unwrap().unwrap();
    assert_eq!(stored, existing);
}

#[test]
fn replace_import_swaps_collection_and_invalid_payloads_write_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let kept = service.create_note().unwrap();

    let err = service
        .import_all(r#"[{"id":"x","title":"ok"},{"id":"y"}]"#, false)
        .unwrap_err();
    assert!(matches!(err, ImportError::MissingRequiredFields { index: 1 }));
    assert!(matches!(
        service.import_all(r#"{"id":"x"}"#, true).unwrap_err(),
        ImportError::NotAnArray
    ));
    assert!(service.get_note(&kept.id).unwrap().is_some());

    let summary = service
        .import_all(
            r#"[{"id":"x","title":"X","content":"body"},{"id":"y","title":"Y"}]"#,
            false,
        )
        .unwrap();
    assert_eq!(summary.count, 2);
    assert!(service.get_note(&kept.id).unwrap().is_none());
    assert_eq!(service.get_note("x").unwrap().unwrap().content, "body");
}

#[test]
fn export_round_trips_through_import() {
    let source_conn = open_db_in_memory().unwrap();
    let source = NoteService::new(SqliteNoteRepository::new(&source_conn));
    let note = source.create_note().unwrap();
    let note = source
        .save_note(&note.id, "Groceries", "milk, eggs", Some("# Groceries\n- milk"))
        .unwrap();
    let exported = source.export_all().unwrap();
    assert!(exported.contains("\"expandedContent\""));

    let target_conn = open_db_in_memory().unwrap();
    let target = NoteService::new(SqliteNoteRepository::new(&target_conn));
    target.import_all(&exported, true).unwrap();
    assert_eq!(target.get_note(&note.id).unwrap().unwrap(), note);
}

#[test]
fn apply_publish_and_search() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let note = service.create_note().unwrap();
    service
        .update_note(
            &note.id,
            &NotePatch::new()
                .title("Trip")
                .content("paris")
                .expanded_content("A week in Paris."),
        )
        .unwrap();

    let published = service.publish(&note.id).unwrap();
    assert!(published.is_published);
    assert_eq!(published.published_content, "A week in Paris.");
    assert!(published.published_at.is_some());

    let applied = service.apply_expanded(&note.id).unwrap();
    assert_eq!(applied.content, "A week in Paris.");
    assert!(applied.shows_generated_display());
    assert_eq!(applied.published_content, "A week in Paris.");

    service
        .update_note(&note.id, &NotePatch::new().content("changed later"))
        .unwrap();
    let listed = service.list_published().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].published_content, "A week in Paris.");

    assert_eq!(service.search("PARIS").unwrap().len(), 1);
    assert!(service.search("london").unwrap().is_empty());

    let unpublished = service.unpublish(&note.id).unwrap();
    assert!(!unpublished.is_published);
    assert!(service.list_published().unwrap().is_empty());
}

#[test]
fn publish_snapshot_is_trimmed_but_text_export_is_not() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let note = service.create_note().unwrap();
    service
        .update_note(
            &note.id,
            &NotePatch::new()
                .content("paris")
                .expanded_content("\n  A week in Paris.  \n"),
        )
        .unwrap();

    let published = service.publish(&note.id).unwrap();
    assert_eq!(published.published_content, "A week in Paris.");
    assert_eq!(
        service.export_text(&note.id).unwrap().text,
        "\n  A week in Paris.  \n"
    );

    service
        .update_note(&note.id, &NotePatch::new().expanded_content("   "))
        .unwrap();
    let republished = service.publish(&note.id).unwrap();
    assert_eq!(republished.published_content, "paris");
}
