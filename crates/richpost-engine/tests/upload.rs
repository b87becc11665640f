//! Image uploads that resolve while the user keeps editing.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::task::LocalSpawnExt;
use pretty_assertions::assert_eq;
use richpost_engine::{
    Cmd, EditorError, EditorHost, HostOptions, ImageUploader, NodeKind, Result, UploadError,
    UploadFile, UploadOutcome, upload_image,
};

type Reply = std::result::Result<String, UploadError>;

/// An uploader that answers whenever the test says so.
struct Pending(RefCell<Option<oneshot::Receiver<Reply>>>);

impl ImageUploader for Pending {
    fn upload(&self, _file: &UploadFile) -> impl Future<Output = Reply> {
        let rx = self.0.borrow_mut().take();
        async move {
            match rx {
                Some(rx) => rx
                    .await
                    .unwrap_or_else(|_| Err(UploadError::Rejected("cancelled".into()))),
                None => Err(UploadError::Rejected("uploader reused".into())),
            }
        }
    }
}

struct InFlight {
    pool: LocalPool,
    reply: oneshot::Sender<Reply>,
    outcome: Rc<RefCell<Option<Result<UploadOutcome>>>>,
}

impl InFlight {
    fn start(host: &Rc<RefCell<EditorHost>>, name: &str) -> Self {
        let (reply, rx) = oneshot::channel();
        let uploader = Pending(RefCell::new(Some(rx)));
        let outcome = Rc::new(RefCell::new(None));
        let pool = LocalPool::new();
        let weak = Rc::downgrade(host);
        let slot = Rc::clone(&outcome);
        let file = UploadFile::new(name, b"\x89PNG".to_vec()).with_content_type("image/png");
        pool.spawner()
            .spawn_local(async move {
                let result = upload_image(weak, &uploader, file).await;
                *slot.borrow_mut() = Some(result);
            })
            .unwrap();
        let mut flight = Self {
            pool,
            reply,
            outcome,
        };
        flight.pool.run_until_stalled();
        flight
    }

    fn finish(mut self, reply: Reply) -> Result<UploadOutcome> {
        self.reply.send(reply).unwrap();
        self.pool.run_until_stalled();
        self.outcome.borrow_mut().take().unwrap()
    }
}

fn host(value: &str) -> Rc<RefCell<EditorHost>> {
    let mut host = EditorHost::new(value, HostOptions::default()).unwrap();
    host.mount().unwrap();
    host.focus().unwrap();
    Rc::new(RefCell::new(host))
}

#[test]
fn test_typing_continues_while_an_upload_runs() {
    let host = host("");
    let flight = InFlight::start(&host, "cat.png");
    for ch in "hello".chars() {
        host.borrow_mut().type_char(ch).unwrap();
    }
    let outcome = flight.finish(Ok("http://x/cat.png".into())).unwrap();
    assert!(matches!(outcome, UploadOutcome::InsertedAtSelection(_)));
    assert_eq!(host.borrow().value(), "hello\n\n![cat.png](http://x/cat.png)\n\n");
}

#[test]
fn test_lost_selection_appends_the_image() {
    let host = host("one\n\ntwo\n\n");
    host.borrow_mut()
        .apply(Cmd::MoveLeft { extend: false })
        .unwrap();
    let flight = InFlight::start(&host, "a.png");
    host.borrow_mut().blur();

    let outcome = flight.finish(Ok("u".into())).unwrap();
    let UploadOutcome::Appended(key) = outcome else {
        panic!("expected the image to be appended, got {outcome:?}");
    };
    let host = host.borrow();
    let doc = host.document();
    assert_eq!(doc.blocks().last(), Some(&key));
    assert_eq!(doc.kind(key).unwrap(), &NodeKind::image("u", "a.png"));
    assert_eq!(doc.blocks().len(), 3);
}

#[test]
fn test_rejection_changes_nothing() {
    let host = host("**keep** me\n\n");
    let before = host.borrow().document().clone();
    let flight = InFlight::start(&host, "big.png");

    let err = flight
        .finish(Err(UploadError::Rejected("413 payload too large".into())))
        .unwrap_err();
    assert!(matches!(err, EditorError::UploadFailure(UploadError::Rejected(_))));
    assert_eq!(host.borrow().document(), &before);
    assert_eq!(host.borrow().value(), "**keep** me\n\n");
}

#[test]
fn test_host_dropped_mid_upload_is_a_no_op() {
    let host = host("");
    let flight = InFlight::start(&host, "a.png");
    drop(host);
    let outcome = flight.finish(Ok("u".into())).unwrap();
    assert_eq!(outcome, UploadOutcome::Discarded);
}

#[test]
fn test_reset_mid_upload_discards_the_result() {
    let host = host("draft\n\n");
    let flight = InFlight::start(&host, "a.png");
    host.borrow_mut().reset("another post").unwrap();
    let outcome = flight.finish(Ok("u".into())).unwrap();
    assert_eq!(outcome, UploadOutcome::Discarded);
    assert_eq!(host.borrow().value(), "another post\n\n");
}
