use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use xlsxedit::{StylePatch, Workbook};

/// A saved workbook with `rows` rows of mixed values on its first sheet
fn prepared(rows: u32) -> Vec<u8> {
    let mut wb = Workbook::blank().unwrap();
    {
        let mut sheet = wb.sheet_mut(0).unwrap();
        for row in 1..=rows {
            sheet.cell((row, 1)).unwrap().set_value(format!("Name_{row}"));
            sheet.cell((row, 2)).unwrap().set_value(row as f64 * 1.5);
            sheet
                .cell((row, 3))
                .unwrap()
                .set_formula(&format!("=B{row}*2"))
                .unwrap();
        }
    }
    wb.add_sheet("Untouched").unwrap().cell("A1").unwrap().set_value("static");
    wb.to_bytes().unwrap()
}

fn benchmark_load(c: &mut Criterion) {
    let mut group = c.benchmark_group("load");
    group.sample_size(10);

    for size in [1000, 10000, 50000].iter() {
        let bytes = prepared(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| {
                let wb = Workbook::from_bytes(bytes.clone()).unwrap();
                black_box(wb.sheet_count());
            });
        });
    }

    group.finish();
}

fn benchmark_edit_and_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("edit_and_save");
    group.sample_size(10);

    for size in [1000, 10000, 50000].iter() {
        let bytes = prepared(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| {
                let mut wb = Workbook::from_bytes(bytes.clone()).unwrap();
                {
                    let mut sheet = wb.sheet_mut(0).unwrap();
                    sheet
                        .cell("A1")
                        .unwrap()
                        .set_value("Title")
                        .set_style(&StylePatch::new().bold(true))
                        .unwrap();
                    sheet.merge("E1:G1").unwrap();
                }
                black_box(wb.to_bytes().unwrap());
            });
        });
    }

    group.finish();
}

fn benchmark_range_style(c: &mut Criterion) {
    let mut group = c.benchmark_group("range_style");
    group.sample_size(10);

    for size in [100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let mut wb = Workbook::blank().unwrap();
                let mut sheet = wb.sheet_mut(0).unwrap();
                sheet
                    .range(format!("A1:J{size}").as_str())
                    .unwrap()
                    .set_style(&StylePatch::new().italic(true).wrap_text(true))
                    .unwrap();
                black_box(sheet.cells().count());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_load,
    benchmark_edit_and_save,
    benchmark_range_style
);
criterion_main!(benches);
