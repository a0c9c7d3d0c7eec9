// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

/*!

The compound-beam footprint and which beams overlap on the sky.

The Apertif phased-array feed forms 40 compound beams. Beam 0 sits at the
center of the footprint; beams 1 through 39 are laid out row by row on a
staggered grid around it. Two beams are *adjacent* when their primary beams
overlap enough that one physical source can be detected in both.

 */

use ndarray::Array2;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// The number of compound beams in the footprint.
pub const N_BEAMS: usize = 40;

/// A compound beam number, 0 through 39.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Beam(u8);

impl Beam {
    pub fn new(n: i64) -> Result<Self> {
        if n < 0 || n >= N_BEAMS as i64 {
            return Err(Error::InvalidBeam(n));
        }

        Ok(Beam(n as u8))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Every beam of the footprint, in order.
    pub fn all() -> impl Iterator<Item = Beam> {
        (0..N_BEAMS as u8).map(Beam)
    }
}

impl fmt::Display for Beam {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl FromStr for Beam {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let n = s
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::BadBeamName(s.to_owned()))?;
        Beam::new(n)
    }
}

/// Overlapping neighbors of each beam, indexed by beam number.
///
/// Only one direction of each pair needs to be listed for correctness, since
/// the table is symmetrized when loaded, but keeping both makes the listing
/// readable.
const APERTIF_NEIGHBORS: [&[u8]; N_BEAMS] = [
    /* 00 */ &[17, 18, 23, 24],
    /* 01 */ &[2, 6],
    /* 02 */ &[1, 3, 6, 7],
    /* 03 */ &[2, 4, 7, 8],
    /* 04 */ &[3, 5, 8, 9],
    /* 05 */ &[4, 9, 10],
    /* 06 */ &[1, 2, 7, 11, 12],
    /* 07 */ &[2, 3, 6, 8, 12, 13],
    /* 08 */ &[3, 4, 7, 9, 13, 14],
    /* 09 */ &[4, 5, 8, 10, 14, 15],
    /* 10 */ &[5, 9, 15],
    /* 11 */ &[6, 12, 16],
    /* 12 */ &[6, 7, 11, 13, 16, 17],
    /* 13 */ &[7, 8, 12, 14, 17, 18],
    /* 14 */ &[8, 9, 13, 15, 18, 19],
    /* 15 */ &[9, 10, 14, 19, 20],
    /* 16 */ &[11, 12, 17, 21, 22],
    /* 17 */ &[0, 12, 13, 16, 18, 22, 23],
    /* 18 */ &[0, 13, 14, 17, 19, 23, 24],
    /* 19 */ &[14, 15, 18, 20, 24, 25],
    /* 20 */ &[15, 19, 25],
    /* 21 */ &[16, 22, 26],
    /* 22 */ &[16, 17, 21, 23, 26, 27],
    /* 23 */ &[0, 17, 18, 22, 24, 27, 28],
    /* 24 */ &[0, 18, 19, 23, 25, 28, 29],
    /* 25 */ &[19, 20, 24, 29, 30],
    /* 26 */ &[21, 22, 27, 31, 32],
    /* 27 */ &[22, 23, 26, 28, 32, 33],
    /* 28 */ &[23, 24, 27, 29, 33, 34],
    /* 29 */ &[24, 25, 28, 30, 34, 35],
    /* 30 */ &[25, 29, 35],
    /* 31 */ &[26, 32, 36],
    /* 32 */ &[26, 27, 31, 33, 36, 37],
    /* 33 */ &[27, 28, 32, 34, 37, 38],
    /* 34 */ &[28, 29, 33, 35, 38, 39],
    /* 35 */ &[29, 30, 34, 39],
    /* 36 */ &[31, 32, 37],
    /* 37 */ &[32, 33, 36, 38],
    /* 38 */ &[33, 34, 37, 39],
    /* 39 */ &[34, 35, 38],
];

/// A symmetric beam-overlap relation, self-adjacency included.
#[derive(Clone, Debug)]
pub struct BeamAdjacency {
    overlap: Array2<bool>,
}

impl BeamAdjacency {
    /// The relation for the Apertif compound-beam footprint.
    pub fn apertif() -> Self {
        Self::from_neighbor_lists(&APERTIF_NEIGHBORS)
    }

    /// Build a relation from per-beam neighbor lists.
    ///
    /// Entries outside the footprint are ignored. The result is always
    /// symmetric and reflexive, whatever the input lists say.
    pub fn from_neighbor_lists(lists: &[&[u8]]) -> Self {
        let mut overlap = Array2::from_elem((N_BEAMS, N_BEAMS), false);

        for i in 0..N_BEAMS {
            overlap[[i, i]] = true;
        }

        for (a, neighbors) in lists.iter().enumerate().take(N_BEAMS) {
            for &b in neighbors.iter() {
                let b = b as usize;

                if b < N_BEAMS {
                    overlap[[a, b]] = true;
                    overlap[[b, a]] = true;
                }
            }
        }

        BeamAdjacency { overlap }
    }

    pub fn is_adjacent(&self, a: Beam, b: Beam) -> bool {
        self.overlap[[a.index(), b.index()]]
    }

    /// The beams overlapping *beam*, not including *beam* itself.
    ///
    /// An empty neighbor set is an error: every beam of the footprint
    /// overlaps some other beam, so this means the relation is broken.
    pub fn neighbors(&self, beam: Beam) -> Result<BTreeSet<Beam>> {
        let set: BTreeSet<Beam> = Beam::all()
            .filter(|&other| other != beam && self.is_adjacent(beam, other))
            .collect();

        if set.is_empty() {
            return Err(Error::NoNeighbors(beam));
        }

        Ok(set)
    }
}

impl Default for BeamAdjacency {
    fn default() -> Self {
        Self::apertif()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(n: i64) -> Beam {
        Beam::new(n).unwrap()
    }

    #[test]
    fn beam_range() {
        assert!(Beam::new(-1).is_err());
        assert!(Beam::new(40).is_err());
        assert_eq!(b(39).number(), 39);
        assert_eq!(b(7).to_string(), "07");
        assert_eq!("17".parse::<Beam>().unwrap(), b(17));
        assert!("x1".parse::<Beam>().is_err());
    }

    #[test]
    fn symmetric() {
        let adj = BeamAdjacency::apertif();

        for x in Beam::all() {
            for y in Beam::all() {
                assert_eq!(adj.is_adjacent(x, y), adj.is_adjacent(y, x), "{x} vs {y}");
            }
        }
    }

    #[test]
    fn neighbor_listing_is_self_consistent() {
        for (a, neighbors) in APERTIF_NEIGHBORS.iter().enumerate() {
            for &n in neighbors.iter() {
                assert!(
                    APERTIF_NEIGHBORS[n as usize].contains(&(a as u8)),
                    "{a} lists {n} but not vice versa"
                );
            }
        }
    }

    #[test]
    fn every_beam_has_neighbors() {
        let adj = BeamAdjacency::apertif();

        for x in Beam::all() {
            let n = adj.neighbors(x).unwrap();
            assert!(!n.contains(&x));
            assert!(n.len() >= 2 && n.len() <= 7, "beam {x} has {} neighbors", n.len());
        }
    }

    #[test]
    fn known_pairs() {
        let adj = BeamAdjacency::apertif();
        assert!(adj.is_adjacent(b(0), b(17)));
        assert!(adj.is_adjacent(b(5), b(5)));
        assert!(!adj.is_adjacent(b(1), b(39)));
        assert_eq!(
            adj.neighbors(b(0)).unwrap().into_iter().collect::<Vec<_>>(),
            vec![b(17), b(18), b(23), b(24)]
        );
    }

    #[test]
    fn isolated_beam_is_an_error() {
        let mut lists: Vec<&[u8]> = APERTIF_NEIGHBORS.to_vec();
        lists[1] = &[];
        lists[2] = &[3, 6, 7];
        lists[6] = &[2, 7, 11, 12];
        let adj = BeamAdjacency::from_neighbor_lists(&lists);

        match adj.neighbors(b(1)) {
            Err(Error::NoNeighbors(beam)) => assert_eq!(beam, b(1)),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
