//! Result writers.
//!
//! Five formats over the same finished partition: the plain member-list
//! output, the mothur list line, the per-swarm statistics table, a
//! UCLUST-like `.uc` file with alignments against each seed, and the
//! internal link structure. All writers are append-only over buffered
//! sinks; nothing here feeds back into clustering.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::cluster::Swarm;
use crate::db::Database;
use crate::kernel;
use crate::score::CostSet;

/// Open `path` for buffered writing; stdout when no path is given.
pub fn create(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => {
            let file = File::create(p)
                .with_context(|| format!("Unable to open {} for writing", p.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

/// Like [`create`], but an absent path means stderr. Used for the internal
/// structure report, which historically defaults there.
pub fn create_or_stderr(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) => create(Some(p)),
        None => Ok(Box::new(BufWriter::new(io::stderr()))),
    }
}

/// One line per swarm, member labels in discovery order.
pub fn write_plain(out: &mut dyn Write, db: &Database, swarms: &[Swarm]) -> Result<()> {
    for swarm in swarms {
        for (k, &member) in swarm.members.iter().enumerate() {
            if k > 0 {
                out.write_all(b" ")?;
            }
            out.write_all(db.label(member).as_bytes())?;
        }
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Single mothur list line: `swarm_<d>`, the swarm count, then each swarm
/// as comma-joined labels.
pub fn write_mothur(
    out: &mut dyn Write,
    db: &Database,
    swarms: &[Swarm],
    resolution: u32,
) -> Result<()> {
    write!(out, "swarm_{}\t{}", resolution, swarms.len())?;
    for swarm in swarms {
        out.write_all(b"\t")?;
        for (k, &member) in swarm.members.iter().enumerate() {
            if k > 0 {
                out.write_all(b",")?;
            }
            out.write_all(db.label(member).as_bytes())?;
        }
    }
    out.write_all(b"\n")?;
    Ok(())
}

/// Per-swarm statistics: size, total abundance, seed label without its
/// abundance annotation, seed abundance, singletons, generations, radius.
pub fn write_statistics(out: &mut dyn Write, db: &Database, swarms: &[Swarm]) -> Result<()> {
    for swarm in swarms {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            swarm.size(),
            swarm.total_abundance,
            db.bare_label(swarm.seed),
            db.abundance(swarm.seed),
            swarm.singletons,
            swarm.max_generation,
            swarm.max_radius
        )?;
    }
    Ok(())
}

/// UCLUST-like records: `S` for each seed, `H` per other member with the
/// alignment against the seed, `C` closing the cluster. Cluster numbers
/// are zero-based; identical sequences print `=` in place of a CIGAR.
pub fn write_uclust(
    out: &mut dyn Write,
    db: &Database,
    swarms: &[Swarm],
    costs: &CostSet,
) -> Result<()> {
    for (number, swarm) in swarms.iter().enumerate() {
        let seed = swarm.seed;
        writeln!(
            out,
            "S\t{}\t{}\t*\t*\t*\t*\t*\t{}\t*",
            number,
            db.seq(seed).len(),
            db.label(seed)
        )?;
        for &member in &swarm.members[1..] {
            let aln = kernel::align(db.seq(member), db.seq(seed), costs);
            let pctid = 100.0 * f64::from(aln.length - aln.diffs) / f64::from(aln.length);
            let cigar = if aln.diffs == 0 { "=" } else { aln.cigar.as_str() };
            writeln!(
                out,
                "H\t{}\t{}\t{:.1}\t+\t0\t0\t{}\t{}\t{}",
                number,
                db.seq(member).len(),
                pctid,
                cigar,
                db.label(member),
                db.label(seed)
            )?;
        }
        writeln!(
            out,
            "C\t{}\t{}\t*\t*\t*\t*\t*\t{}\t*",
            number,
            swarm.size(),
            db.label(seed)
        )?;
    }
    Ok(())
}

/// Internal link structure: parent label, child label, distance, swarm
/// number (one-based), child generation.
pub fn write_structure(out: &mut dyn Write, db: &Database, swarms: &[Swarm]) -> Result<()> {
    for (number, swarm) in swarms.iter().enumerate() {
        for edge in &swarm.edges {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                db.label(edge.parent),
                db.label(edge.child),
                edge.distance,
                number + 1,
                edge.generation
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{cluster, LinkEngine};
    use crate::db::AbundanceStyle;
    use crate::kernel::DistanceKernel;
    use crate::score::CostSet;

    fn setup() -> (Database, Vec<Swarm>, CostSet) {
        let fasta = ">a_10\nAAAA\n>c_8\nAATT\n>b_1\nAAAT\n>x_5\nGGGGGGGG\n";
        let db = Database::from_reader(fasta.as_bytes(), AbundanceStyle::Trailing).unwrap();
        let costs = CostSet::reduce(9, 12, 7);
        let engine = LinkEngine::Lanes(DistanceKernel::new(costs, 1).unwrap());
        let swarms = cluster(&db, &engine, false);
        (db, swarms, costs)
    }

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        let mut buf: Vec<u8> = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn plain_lists_each_swarm_on_one_line() {
        let (db, swarms, _) = setup();
        let text = render(|out| write_plain(out, &db, &swarms));
        assert_eq!(text, "a_10 b_1 c_8\nx_5\n");
    }

    #[test]
    fn mothur_packs_everything_on_one_line() {
        let (db, swarms, _) = setup();
        let text = render(|out| write_mothur(out, &db, &swarms, 1));
        assert_eq!(text, "swarm_1\t2\ta_10,b_1,c_8\tx_5\n");
    }

    #[test]
    fn statistics_covers_both_swarms() {
        let (db, swarms, _) = setup();
        let text = render(|out| write_statistics(out, &db, &swarms));
        assert_eq!(text, "3\t19\ta\t10\t1\t2\t2\n1\t5\tx\t5\t0\t0\t0\n");
    }

    #[test]
    fn uclust_records_follow_the_uc_layout() {
        let (db, swarms, costs) = setup();
        let text = render(|out| write_uclust(out, &db, &swarms, &costs));
        let expected = "\
S\t0\t4\t*\t*\t*\t*\t*\ta_10\t*
H\t0\t4\t75.0\t+\t0\t0\t4M\tb_1\ta_10
H\t0\t4\t50.0\t+\t0\t0\t4M\tc_8\ta_10
C\t0\t3\t*\t*\t*\t*\t*\ta_10\t*
S\t1\t8\t*\t*\t*\t*\t*\tx_5\t*
C\t1\t1\t*\t*\t*\t*\t*\tx_5\t*
";
        assert_eq!(text, expected);
    }

    #[test]
    fn identical_members_print_an_equals_alignment() {
        let fasta = ">a_9\nGGGG\n>b_5\nGGGG\n";
        let db = Database::from_reader(fasta.as_bytes(), AbundanceStyle::Trailing).unwrap();
        let costs = CostSet::reduce(9, 12, 7);
        let engine = LinkEngine::Lanes(DistanceKernel::new(costs, 1).unwrap());
        let swarms = cluster(&db, &engine, false);

        let text = render(|out| write_uclust(out, &db, &swarms, &costs));
        assert!(text.contains("H\t0\t4\t100.0\t+\t0\t0\t=\tb_5\ta_9\n"));
    }

    #[test]
    fn structure_lists_links_with_swarm_and_generation() {
        let (db, swarms, _) = setup();
        let text = render(|out| write_structure(out, &db, &swarms));
        // AATT joins through the low-abundance bridge in generation 2
        assert_eq!(text, "a_10\tb_1\t1\t1\t1\nb_1\tc_8\t1\t1\t2\n");
    }
}
