mod support;

use chan_core::{
    diff_file_arrays, diff_files, diff_post_arrays, diff_posts, diff_threads, FileField, PostField,
    ThreadField,
};
use pretty_assertions::assert_eq;

use support::{file, init_logging, post, thread};

#[test]
fn diff_of_identical_entities_is_empty() {
    init_logging();
    let f = file("1.png");
    let p = post(5, vec![file("1.png"), file("2.png")]);
    let t = thread(100, vec![post(100, vec![file("a.png")]), p.clone()]);

    assert!(diff_files(&f, &f).is_empty());
    let posts = diff_posts(&p, &p);
    assert!(posts.is_empty());
    assert_eq!(posts.files_diff, None);
    let threads = diff_threads(&t, &t, &[]);
    assert!(threads.is_empty());
    assert_eq!(threads.posts_diff, None);
}

#[test]
fn file_fields_follow_declared_order() {
    init_logging();
    let old = file("1.png");
    let mut new = old.clone();
    new.is_deleted = true;
    new.check_sum = "ffff".to_string();
    new.thumbnail_url = "https://2ch.hk/b/thumb/other".to_string();
    new.list_index = 3;

    let diff = diff_files(&old, &new);
    assert_eq!(
        diff.fields,
        vec![FileField::ThumbnailUrl, FileField::CheckSum, FileField::IsDeleted]
    );
    assert_eq!(diff.old, old);
    assert_eq!(diff.new, new);
}

#[test]
fn shared_urls_never_land_in_only_sets() {
    init_logging();
    let old = vec![file("1.png"), file("2.png"), file("3.png")];
    let mut changed = file("2.png");
    changed.upload_name = "renamed".to_string();
    let new = vec![file("4.png"), changed, file("1.png")];

    let diff = diff_file_arrays(&old, &new);

    assert_eq!(diff.only_in_old, vec![file("3.png")]);
    assert_eq!(diff.only_in_new, vec![file("4.png")]);
    assert_eq!(diff.differences.len(), 1);
    assert_eq!(diff.differences[0].old.url, file("2.png").url);
    assert_eq!(diff.differences[0].fields, vec![FileField::UploadName]);
}

#[test]
fn duplicate_keys_pair_first_unclaimed() {
    init_logging();
    let mut second = post(7, Vec::new());
    second.comment = "second copy".to_string();
    let old = vec![post(7, Vec::new()), second.clone()];
    let new = vec![post(7, Vec::new())];

    let diff = diff_post_arrays(&old, &new);

    assert!(diff.differences.is_empty());
    assert!(diff.only_in_new.is_empty());
    assert_eq!(diff.only_in_old, vec![second]);
}

#[test]
fn nested_file_changes_add_files_sentinel() {
    init_logging();
    let old = post(5, vec![file("1.png")]);
    let mut new = post(5, vec![file("1.png"), file("2.png")]);
    new.is_banned = true;

    let diff = diff_posts(&old, &new);

    assert_eq!(diff.fields, vec![PostField::IsBanned, PostField::Files]);
    let files = diff.files_diff.expect("nested file diff");
    assert_eq!(files.only_in_new, vec![file("2.png")]);
    assert!(files.only_in_old.is_empty());
}

#[test]
fn list_index_is_not_compared() {
    init_logging();
    let old = post(5, Vec::new());
    let mut new = old.clone();
    new.list_index = 9;

    assert!(diff_posts(&old, &new).is_empty());
}

#[test]
fn thread_diff_skips_ignored_fields_and_adds_posts_sentinel() {
    init_logging();
    let old = thread(100, vec![post(100, Vec::new())]);
    let mut new = thread(100, vec![post(100, Vec::new()), post(101, Vec::new())]);
    new.views_count = 50;
    new.last_activity = 1_700_000_999;
    new.posters_count = 2;

    let all = diff_threads(&old, &new, &[]);
    assert_eq!(
        all.fields,
        vec![
            ThreadField::PostersCount,
            ThreadField::ViewsCount,
            ThreadField::LastActivity,
            ThreadField::Posts,
        ]
    );

    let scoped = diff_threads(&old, &new, &ThreadField::CATALOG_OWNED);
    assert_eq!(scoped.fields, vec![ThreadField::PostersCount, ThreadField::Posts]);
    assert_eq!(scoped.scalar_fields(), vec![ThreadField::PostersCount]);
    let posts = scoped.posts_diff.expect("nested post diff");
    assert_eq!(posts.only_in_new.len(), 1);
    assert_eq!(posts.only_in_new[0].number, 101);
}

#[test]
fn diff_is_deterministic() {
    init_logging();
    let old = thread(100, vec![post(1, vec![file("a")]), post(2, Vec::new())]);
    let mut new = thread(100, vec![post(2, vec![file("b")]), post(3, Vec::new())]);
    new.title = "retitled".to_string();

    let first = diff_threads(&old, &new, &[]);
    for _ in 0..5 {
        assert_eq!(diff_threads(&old, &new, &[]), first);
    }
}

#[test]
fn field_names_are_camel_case() {
    assert_eq!(ThreadField::PostersCount.name(), "postersCount");
    assert_eq!(PostField::IsBanned.to_string(), "isBanned");
    assert_eq!(FileField::CheckSum.name(), "checkSum");
    assert_eq!(
        serde_json::to_value(ThreadField::LastActivity).unwrap(),
        serde_json::json!("lastActivity")
    );
}
