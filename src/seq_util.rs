fn comp_base(x: u8) -> u8 {
    match x {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'N' => b'N',
        b'a' => b't',
        b't' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        b'n' => b'n',
        y => panic!("Unsupported DNA string character {y}"),
    }
}

/// Return true if every character in `dna` is accepted by the reverse complement methods
pub fn is_supported_dna(dna: &[u8]) -> bool {
    dna.iter().all(|x| b"ACGTNacgtn".contains(x))
}

pub fn rev_comp(dna: &[u8]) -> Vec<u8> {
    dna.iter().rev().map(|&x| comp_base(x)).collect::<Vec<_>>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rev_comp() {
        let input = b"NNATGCG".to_vec();
        let expected_output = b"CGCATNN".to_vec();
        let output = rev_comp(&input);
        assert_eq!(output, expected_output);
    }

    #[test]
    fn test_is_supported_dna() {
        assert!(is_supported_dna(b"ACGTNacgtn"));
        assert!(!is_supported_dna(b"ACGR"));
    }
}
