/*
 * Unit tests for the floor label codec
 *
 * The unit tests follows the Arrange, Act, Assert pattern.
 */

/***************************************/
/*             Unit tests              */
/***************************************/
#[cfg(test)]
mod floor_tests {
    use crate::floor::{Floor, FloorError};
    use crate::shared::Direction::{Down, Up};

    #[test]
    fn test_parse_and_format_round_trip() {
        // Every valid label comes back out exactly as it went in
        for label in ["B99", "B10", "B1", "1", "2", "10", "42", "999"] {
            let floor = Floor::parse(label).unwrap();
            assert_eq!(floor.to_string(), label);
        }
    }

    #[test]
    fn test_parse_rejects_bad_labels() {
        assert_eq!(Floor::parse(""), Err(FloorError::Empty));
        assert_eq!(Floor::parse("0"), Err(FloorError::OutOfRange));
        assert_eq!(Floor::parse("B0"), Err(FloorError::OutOfRange));
        assert_eq!(Floor::parse("B100"), Err(FloorError::OutOfRange));
        assert_eq!(Floor::parse("1000"), Err(FloorError::OutOfRange));
        assert_eq!(Floor::parse("4a"), Err(FloorError::Invalid("4a".to_string())));
        assert_eq!(Floor::parse("B"), Err(FloorError::Invalid("B".to_string())));
        assert_eq!(Floor::parse("-3"), Err(FloorError::Invalid("-3".to_string())));
        assert_eq!(Floor::parse("+3"), Err(FloorError::Invalid("+3".to_string())));
        assert_eq!(Floor::parse("007"), Err(FloorError::Invalid("007".to_string())));
        assert_eq!(Floor::parse("B07"), Err(FloorError::Invalid("B07".to_string())));
        assert_eq!(Floor::parse("3 "), Err(FloorError::Invalid("3 ".to_string())));
    }

    #[test]
    fn test_step_skips_ground_zero() {
        // Arrange
        let b1 = Floor::parse("B1").unwrap();
        let one = Floor::parse("1").unwrap();

        // Act / Assert
        assert_eq!(b1.step(Up), Ok(one));
        assert_eq!(one.step(Down), Ok(b1));
    }

    #[test]
    fn test_step_is_bounded() {
        let bottom = Floor::parse("B99").unwrap();
        let top = Floor::parse("999").unwrap();

        assert_eq!(bottom.step(Down), Err(FloorError::OutOfRange));
        assert_eq!(top.step(Up), Err(FloorError::OutOfRange));
    }

    #[test]
    fn test_step_round_trip() {
        // step(step(f, up), down) == f wherever both steps are in range
        for label in ["B99", "B2", "B1", "1", "5", "998"] {
            let floor = Floor::parse(label).unwrap();
            assert_eq!(floor.step(Up).unwrap().step(Down), Ok(floor));
        }
    }

    #[test]
    fn test_ordering_follows_building_height() {
        let b2 = Floor::parse("B2").unwrap();
        let b1 = Floor::parse("B1").unwrap();
        let one = Floor::parse("1").unwrap();
        let ten = Floor::parse("10").unwrap();

        assert!(b2 < b1);
        assert!(b1 < one);
        assert!(one < ten);
    }

    #[test]
    fn test_toward_destination() {
        let two = Floor::parse("2").unwrap();
        let five = Floor::parse("5").unwrap();

        assert_eq!(two.toward(five), Some(Up));
        assert_eq!(five.toward(two), Some(Down));
        assert_eq!(five.toward(five), None);
    }
}
