//! This bench test simulates planning a release of a large changelog tree,
//! with one master changelog including a few hundred changelogs.

#![allow(missing_docs)]

use std::{fmt::Write, fs, path::Path};

use changelog_release::{Project, Release, Version};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use tempfile::TempDir;

const INCLUDES: usize = 200;
const ENTRIES: usize = 10;

fn changelog(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<databaseChangeLog xmlns=\"http://www.liquibase.org/xml/ns/dbchangelog\">\n{body}</databaseChangeLog>\n"
    )
}

/// Generates a master changelog and the changelogs it includes
fn preseed_tree(path: &Path) {
    let mut master = String::new();
    for i in 0..INCLUDES {
        writeln!(
            master,
            "\t<include file=\"changes/component{i}_latest.xml\" relativeToChangelogFile=\"true\"/>"
        )
        .unwrap();

        let mut entries = String::new();
        for j in 0..ENTRIES {
            writeln!(
                entries,
                "\t<changeSet id=\"{j}\" author=\"bench\">\n\t\t<sql>INSERT INTO t{i} VALUES ({j});</sql>\n\t</changeSet>"
            )
            .unwrap();
        }
        fs::create_dir_all(path.join("changes")).unwrap();
        fs::write(
            path.join(format!("changes/component{i}_latest.xml")),
            changelog(&entries),
        )
        .unwrap();
    }
    fs::write(path.join("master.xml"), changelog(&master)).unwrap();
}

fn plan_release(c: &mut Criterion) {
    c.bench_function("plan release", |b| {
        b.iter_batched(
            || {
                let tmp_dir = TempDir::new().unwrap();
                preseed_tree(tmp_dir.path());
                tmp_dir
            },
            |tmp_dir| {
                let release = Release::new(Version::new("1.0.0").unwrap(), tmp_dir.path());
                let mut project = Project::new(release);
                project.add_master(tmp_dir.path().join("master.xml")).unwrap();
                project.plan().unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, plan_release);
criterion_main!(benches);
