//! End-to-end: compile a post, ship its HTML, unlock it again.

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;
use quill_crypt::{
    Compiler, DecryptWidget, EncryptionStage, HeadingIndex, InteractiveBlockScanner,
    InteractiveKind, KdfParams, PageUnlocker, WidgetState, locked_blocks, reveal_block,
};
use quill_markup::{Document, Pipeline};

const PARAMS: KdfParams = KdfParams { iterations: 1000 };
const REVERT: Duration = Duration::from_millis(10);

fn compiler() -> Compiler {
    Compiler::new(Pipeline::default(), EncryptionStage::new(PARAMS))
}

const POST: &str = r#"---
title: Diary
password: open sesame
---
# Diary

## Monday

Tea with {日^にち} and !!a secret!!.

;;;day Morning
Coffee
;;;

;;;day Evening
Wine
;;;
"#;

#[test]
fn encrypted_post_unlocks_and_reindexes() {
    let page = compiler().compile(POST).unwrap();
    assert!(page.document_encrypted);
    assert!(page.toc.is_empty());
    assert!(!page.html.contains("Monday"));
    assert!(!page.html.contains("open sesame"));
    assert!(page.html.contains(r#"data-pagefind-ignore="all""#));

    let mut doc = Document::parse(&page.html).unwrap();
    let mut unlocker = PageUnlocker::locate(&doc, PARAMS, REVERT).unwrap();
    let mut headings = HeadingIndex::default();
    let mut interactive = InteractiveBlockScanner::default();

    let start = Instant::now();
    let job = unlocker.submit("open says me").unwrap();
    unlocker
        .complete(&mut doc, job.run(), start, &mut [&mut headings, &mut interactive])
        .unwrap();
    assert_eq!(unlocker.state(), WidgetState::Error);
    assert_eq!(headings.runs, 0);
    unlocker.tick(start + REVERT);

    let job = unlocker.submit("open sesame").unwrap();
    unlocker
        .complete(&mut doc, job.run(), Instant::now(), &mut [&mut headings, &mut interactive])
        .unwrap();
    assert_eq!(unlocker.state(), WidgetState::Unlocked);

    let html = doc.serialize();
    assert!(html.contains("<ruby>日<rp>(</rp><rt>にち</rt><rp>)</rp></ruby>"));
    assert!(!html.contains("encrypted-post"));

    assert_eq!(headings.runs, 1);
    let ids: Vec<_> = headings.entries.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["diary", "monday"]);

    assert_eq!(interactive.runs, 1);
    let kinds: Vec<_> = interactive.found.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(kinds, vec![InteractiveKind::Spoiler, InteractiveKind::Tabs]);
}

#[test]
fn encrypted_block_unlocks_in_place() {
    let source = "Public intro\n\n:::encrypted{password=\"pw\"}\nPrivate **notes**\n:::\n";
    let page = compiler().compile(source).unwrap();
    assert_eq!(page.encrypted_blocks, 1);
    assert!(page.html.starts_with("<p>Public intro</p>"));
    assert!(!page.html.contains("Private"));

    let mut doc = Document::parse(&page.html).unwrap();
    let block = locked_blocks(&doc)[0];
    let mut widget = DecryptWidget::from_element(doc.element(block).unwrap(), PARAMS, REVERT);
    let job = widget.submit("pw").unwrap();
    assert!(widget.complete(job.run(), Instant::now()));

    let content = widget.content().unwrap().to_owned();
    assert_eq!(content.trim(), "<p>Private <strong>notes</strong></p>");
    reveal_block(&mut doc, block, &content).unwrap();
    assert!(doc.serialize().contains("<p>Private <strong>notes</strong></p>"));
}

#[test]
fn every_password_round_trips_only_with_itself() {
    let passwords = ["a", "pässwörd", "with \"quotes\" {braces}", "😀"];
    for password in passwords {
        let source = format!("---\npassword: '{}'\n---\nBody text\n", password.replace('\'', "''"));
        let page = compiler().compile(&source).unwrap();
        let doc = Document::parse(&page.html).unwrap();

        for attempt in passwords {
            let mut unlocker = PageUnlocker::locate(&doc, PARAMS, REVERT).unwrap();
            let mut scratch = doc.clone();
            let job = unlocker.submit(attempt).unwrap();
            unlocker
                .complete(&mut scratch, job.run(), Instant::now(), &mut [])
                .unwrap();
            if attempt == password {
                assert_eq!(unlocker.state(), WidgetState::Unlocked);
                assert_eq!(scratch.serialize(), "<p>Body text</p>");
            } else {
                assert_eq!(unlocker.state(), WidgetState::Error);
                assert_eq!(scratch.serialize(), doc.serialize());
            }
        }
    }
}
