use async_trait::async_trait;
use myai_core::db::open_db_in_memory;
use myai_core::{
    CompletionClient, FocusState, NotePatch, NoteService, NoteSession, ProviderError,
    ProviderKind, ProviderResult, ProviderSource, SelectedText, SelectionDescriptor,
    SqliteNoteRepository, StatusKind, ViewRegion,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const NOTE: &str = "Section one. Section two. Section three.";

struct FakeClient {
    reply: ProviderResult<String>,
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionClient for FakeClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    async fn complete(&self, _system_prompt: &str, _user_prompt: &str) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.reply.clone()
    }
}

struct FakeProviders {
    client: Option<Arc<FakeClient>>,
}

impl FakeProviders {
    fn replying(text: &str) -> (Self, Arc<FakeClient>) {
        Self::with_result(Ok(text.to_string()))
    }

    fn with_result(reply: ProviderResult<String>) -> (Self, Arc<FakeClient>) {
        let client = Arc::new(FakeClient {
            reply,
            calls: AtomicUsize::new(0),
        });
        (
            Self {
                client: Some(client.clone()),
            },
            client,
        )
    }

    fn none() -> Self {
        Self { client: None }
    }
}

impl ProviderSource for FakeProviders {
    fn resolve(&self) -> ProviderResult<Arc<dyn CompletionClient>> {
        match &self.client {
            Some(client) => {
                let client: Arc<dyn CompletionClient> = client.clone();
                Ok(client)
            }
            None => Err(ProviderError::NoProviderAvailable),
        }
    }

    fn is_available(&self) -> bool {
        self.client.is_some()
    }
}

fn seeded_note(service: &NoteService<SqliteNoteRepository<'_>>, content: &str) -> String {
    let note = service.create_note().unwrap();
    service
        .update_note(
            &note.id,
            &NotePatch::new()
                .content(content)
                .expanded_content("previous expansion"),
        )
        .unwrap();
    note.id
}

fn editor(start: usize, end: usize) -> FocusState<'static> {
    FocusState::Editor {
        selection_start: start,
        selection_end: end,
    }
}

#[tokio::test]
async fn regenerating_a_selection_splices_and_persists_both_fields() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let id = seeded_note(&service, NOTE);
    let (providers, client) = FakeProviders::replying("The middle part.");
    let session = NoteSession::new(&service, providers, id.clone());

    let report = session.regenerate(&editor(13, 25)).await.unwrap();

    assert_eq!(report.status.kind, StatusKind::Success);
    assert_eq!(report.status.text, "Section regenerated successfully.");
    assert_eq!(
        report.progress.unwrap().text,
        "Regenerating the selected section..."
    );
    assert!(report.selection_cleared);
    let stored = service.get_note(&id).unwrap().unwrap();
    assert_eq!(stored.content, "Section one. The middle part. Section three.");
    assert_eq!(stored.expanded_content, stored.content);
    assert_eq!(report.note.unwrap(), stored);
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rendered_selection_is_located_in_canonical_text() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let id = seeded_note(&service, NOTE);
    let (providers, _client) = FakeProviders::replying("Section two.");
    let session = NoteSession::new(&service, providers, id.clone());

    let focus = FocusState::Rendered {
        anchor: ViewRegion::DisplayPanel,
        focus: ViewRegion::DisplayPanel,
        selected: SelectedText::Plain("Section two."),
    };
    assert!(session.can_regenerate(&focus));
    let report = session.regenerate(&focus).await.unwrap();

    assert_eq!(report.status.kind, StatusKind::Success);
    assert_eq!(service.get_note(&id).unwrap().unwrap().content, NOTE);
}

#[tokio::test]
async fn unmappable_selection_is_refused_without_a_call() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let id = seeded_note(&service, "line one\n\nline two");
    let (providers, client) = FakeProviders::replying("unused");
    let session = NoteSession::new(&service, providers, id.clone());

    let focus = FocusState::Rendered {
        anchor: ViewRegion::ExpandedPanel,
        focus: ViewRegion::ExpandedPanel,
        selected: SelectedText::Plain("line one line two"),
    };
    let report = session.regenerate(&focus).await.unwrap();

    assert_eq!(
        report.status.text,
        "Unable to map the selected text back to the saved note. Try selecting the text from the editor view."
    );
    assert!(report.progress.is_none());
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        service.get_note(&id).unwrap().unwrap().content,
        "line one\n\nline two"
    );
}

#[tokio::test]
async fn missing_selection_and_missing_provider_are_reported() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let id = seeded_note(&service, NOTE);

    let (providers, client) = FakeProviders::replying("unused");
    let session = NoteSession::new(&service, providers, id.clone());
    let report = session.regenerate(&editor(5, 5)).await.unwrap();
    assert_eq!(
        report.status.text,
        "Highlight a portion of the note to regenerate it."
    );
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);

    let session = NoteSession::new(&service, FakeProviders::none(), id.clone());
    assert!(!session.can_regenerate(&editor(13, 25)));
    let report = session.regenerate(&editor(13, 25)).await.unwrap();
    assert_eq!(
        report.status.text,
        "Please set an API key for at least one enabled provider in Settings."
    );
    let report = session.expand().await.unwrap();
    assert_eq!(report.status.kind, StatusKind::Error);
}

#[tokio::test]
async fn provider_failure_leaves_note_untouched() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let id = seeded_note(&service, NOTE);
    let before = service.get_note(&id).unwrap().unwrap();
    let (providers, _client) = FakeProviders::with_result(Err(ProviderError::Api {
        provider: ProviderKind::Claude,
        status: 529,
        message: "Overloaded".to_string(),
    }));
    let session = NoteSession::new(&service, providers, id.clone());

    let report = session.regenerate(&editor(13, 25)).await.unwrap();
    assert_eq!(report.status.text, "Error: Overloaded");
    assert!(!report.selection_cleared);
    assert_eq!(service.get_note(&id).unwrap().unwrap(), before);

    let report = session.expand().await.unwrap();
    assert_eq!(report.status.text, "Error: Overloaded");
    assert_eq!(service.get_note(&id).unwrap().unwrap(), before);
}

#[tokio::test]
async fn blank_reply_is_an_error() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let id = seeded_note(&service, NOTE);
    let before = service.get_note(&id).unwrap().unwrap();
    let (providers, _client) = FakeProviders::replying(" \n ");
    let session = NoteSession::new(&service, providers, id.clone());

    let report = session.regenerate(&editor(13, 25)).await.unwrap();
    assert_eq!(
        report.status.text,
        "Error: The AI response did not contain any content to insert."
    );
    assert_eq!(service.get_note(&id).unwrap().unwrap(), before);
}

#[tokio::test]
async fn concurrent_regenerations_make_one_call() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let id = seeded_note(&service, NOTE);
    let (providers, client) = FakeProviders::replying("The middle part.");
    let session = NoteSession::new(&service, providers, id.clone());
    let focus = editor(13, 25);

    let (first, second) = tokio::join!(session.regenerate(&focus), session.regenerate(&focus));

    assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    assert!(first.is_some());
    assert!(second.is_none());
    assert!(!session.is_busy());
}

#[tokio::test]
async fn expansion_replaces_only_expanded_content() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let id = seeded_note(&service, "  buy milk  ");
    let (providers, client) = FakeProviders::replying("# Shopping\n\n- Milk");
    let session = NoteSession::new(&service, providers, id.clone());

    let report = session.expand().await.unwrap();
    assert_eq!(report.status.text, "Note expanded successfully!");
    assert_eq!(report.progress.unwrap().text, "Expanding with Claude...");

    let stored = service.get_note(&id).unwrap().unwrap();
    assert_eq!(stored.content, "  buy milk  ");
    assert_eq!(stored.expanded_content, "# Shopping\n\n- Milk");
    assert_eq!(client.calls.load(Ordering::SeqCst), 1);

    let (first, second) = tokio::join!(session.expand(), session.expand());
    assert!(first.is_some());
    assert!(second.is_none());
    assert_eq!(client.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn empty_note_is_not_expanded() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let id = seeded_note(&service, "   ");
    let (providers, client) = FakeProviders::replying("unused");
    let session = NoteSession::new(&service, providers, id);

    let report = session.expand().await.unwrap();
    assert_eq!(report.status.text, "Please write something first.");
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn stale_descriptor_splices_against_its_captured_context() {
    let conn = open_db_in_memory().unwrap();
    let service = NoteService::new(SqliteNoteRepository::new(&conn));
    let id = seeded_note(&service, NOTE);
    let descriptor = SelectionDescriptor::mapped(NOTE, 0, 12).unwrap();
    service
        .update_note(&id, &NotePatch::new().content("edited meanwhile"))
        .unwrap();
    let (providers, _client) = FakeProviders::replying("First.");
    let session = NoteSession::new(&service, providers, id.clone());

    let report = session.regenerate_selection(&descriptor).await.unwrap();
    assert_eq!(report.status.kind, StatusKind::Success);
    assert_eq!(
        service.get_note(&id).unwrap().unwrap().content,
        "First. Section two. Section three."
    );
}
