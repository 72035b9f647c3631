use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sheetcalc_core::{CellRange, Workbook};
use sheetcalc_formula::{
    collect_values, evaluate_formula, AreaEval, CollectionPolicy, EvaluationContext, ValueEval,
    ValueLocale,
};

fn build_column(rows: u32) -> Workbook {
    let mut workbook = Workbook::new();
    let sheet = workbook.worksheet_mut(0).unwrap();
    for row in 0..rows {
        // Every tenth cell is text so the skip path is exercised too
        if row % 10 == 9 {
            sheet.set_cell_value_at(row, 0, "n/a").unwrap();
        } else {
            sheet.set_cell_value_at(row, 0, f64::from(row % 100)).unwrap();
        }
    }
    workbook
}

fn bench_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_values");
    let locale = ValueLocale::default();

    for rows in [1_000u32, 10_000, 100_000] {
        let workbook = build_column(rows);
        let area = ValueEval::Area(AreaEval::new(
            &workbook,
            0,
            CellRange::from_indices(0, 0, rows - 1, 0),
        ));

        group.throughput(Throughput::Elements(u64::from(rows)));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &area, |b, area| {
            b.iter(|| {
                let values =
                    collect_values(std::slice::from_ref(area), &CollectionPolicy::DEFAULT, &locale)
                        .unwrap();
                black_box(values.len())
            })
        });
    }
    group.finish();
}

fn bench_broadcast(c: &mut Criterion) {
    let workbook = build_column(10_000);
    let ctx = EvaluationContext::new(&workbook, 0, 0, 3).with_array_mode(true);

    c.bench_function("sumproduct_10k", |b| {
        b.iter(|| black_box(evaluate_formula("=SUMPRODUCT((A1:A10000>50)*1)", &ctx).unwrap()))
    });
}

criterion_group!(benches, bench_collect, bench_broadcast);
criterion_main!(benches);
