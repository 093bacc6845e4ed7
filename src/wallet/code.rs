//! Wallet Contract Code
//!
//! Each version's code is immutable. The crate ships the verified code BOC of
//! every version except highload v1, whose code the caller supplies.

use super::version::WalletVersion;
use crate::cell::{ArcCell, Cell, CellDigest};
use crate::error::{ErrorCode, HawalaError, HawalaResult};

const V1R1_CODE: &str = "B5EE9C72410101010044000084FF0020DDA4F260810200D71820D70B1FED44D0D31FD3FFD15112BAF2A122F901541044F910F2A2F80001D31F3120D74A96D307D402FB00DED1A4C8CB1FCBFFC9ED5441FDF089";
const V1R2_CODE: &str = "B5EE9C724101010100530000A2FF0020DD2082014C97BA9730ED44D0D70B1FE0A4F260810200D71820D70B1FED44D0D31FD3FFD15112BAF2A122F901541044F910F2A2F80001D31F3120D74A96D307D402FB00DED1A4C8CB1FCBFFC9ED54D0E2786F";
const V1R3_CODE: &str = "B5EE9C7241010101005F0000BAFF0020DD2082014C97BA218201339CBAB19C71B0ED44D0D31FD70BFFE304E0A4F260810200D71820D70B1FED44D0D31FD3FFD15112BAF2A122F901541044F910F2A2F80001D31F3120D74A96D307D402FB00DED1A4C8CB1FCBFFC9ED54B5B86E42";
const V2R1_CODE: &str = "B5EE9C724101010100570000AAFF0020DD2082014C97BA9730ED44D0D70B1FE0A4F2608308D71820D31FD31F01F823BBF263ED44D0D31FD3FFD15131BAF2A103F901541042F910F2A2F800029320D74A96D307D402FB00E8D1A4C8CB1FCBFFC9ED54A1370BB6";
const V2R2_CODE: &str = "B5EE9C724101010100630000C2FF0020DD2082014C97BA218201339CBAB19C71B0ED44D0D31FD70BFFE304E0A4F2608308D71820D31FD31F01F823BBF263ED44D0D31FD3FFD15131BAF2A103F901541042F910F2A2F800029320D74A96D307D402FB00E8D1A4C8CB1FCBFFC9ED54044CD7A1";
const V3R1_CODE: &str = "B5EE9C724101010100620000C0FF0020DD2082014C97BA9730ED44D0D70B1FE0A4F2608308D71820D31FD31FD31FF82313BBF263ED44D0D31FD31FD3FFD15132BAF2A15144BAF2A204F901541055F910F2A3F8009320D74A96D307D402FB00E8D101A4C8CB1FCB1FCBFFC9ED543FBE6EE0";
const V3R2_CODE: &str = "B5EE9C724101010100710000DEFF0020DD2082014C97BA218201339CBAB19F71B0ED44D0D31FD31F31D70BFFE304E0A4F2608308D71820D31FD31FD31FF82313BBF263ED44D0D31FD31FD3FFD15132BAF2A15144BAF2A204F901541055F910F2A3F8009320D74A96D307D402FB00E8D101A4C8CB1FCB1FCBFFC9ED5410BD6DAD";
const V5R1_CODE: &str = concat!(
    "B5EE9C7241021401000281000114FF00F4A413F4BCF2C80B01020120020302014804050102F20E02DCD020D749C120915B8F",
    "6320D70B1F2082106578746EBD21821073696E74BDB0925F03E082106578746EBA8EB48020D72101D074D721FA4030FA44F8",
    "28FA443058BD915BE0ED44D0810141D721F4058307F40E6FA1319130E18040D721707FDB3CE03120D749810280B99130E070",
    "E2100F020120060702012008090019BE5F0F6A2684080A0EB90FA02C02016E0A0B0201480C0D0019ADCE76A2684020EB90EB",
    "85FFC00019AF1DF6A2684010EB90EB858FC00017B325FB51341C75C875C2C7E00011B262FB513435C28020011E20D70B1F82",
    "107369676EBAF2E08A7F0F01E68EF0EDA2EDFB218308D722028308D723208020D721D31FD31FD31FED44D0D200D31F20D31F",
    "D3FFD70A000AF90140CCF9109A28945F0ADB31E1F2C087DF02B35007B0F2D0845125BAF2E0855036BAF2E086F823BBF2D088",
    "2292F800DE01A47FC8CA00CB1F01CF16C9ED542092F80FDE70DB3CD81003F6EDA2EDFB02F404216E926C218E4C0221D73930",
    "709421C700B38E2D01D72820761E436C20D749C008F2E09320D74AC002F2E09320D71D06C712C2005230B0F2D089D74CD739",
    "3001A4E86C128407BBF2E093D74AC000F2E093ED55E2D20001C000915BE0EBD72C08142091709601D72C081C12E25210B1E3",
    "0F20D74A111213009601FA4001FA44F828FA443058BAF2E091ED44D0810141D718F405049D7FC8CA0040048307F453F2E08B",
    "8E14038307F45BF2E08C22D70A00216E01B3B0F2D090E2C85003CF1612F400C9ED54007230D72C08248E2D21F2E092D200ED",
    "44D0D2005113BAF2D08F54503091319C01810140D721D70A00F2E08EE2C8CA0058CF16C9ED5493F2C08DE20010935BDB31E1",
    "D74CD0A89FD648",
);
const HIGHLOAD_V2_CODE: &str = "B5EE9C724101090100E5000114FF00F4A413F4BCF2C80B010201200203020148040501EAF28308D71820D31FD33FF823AA1F5320B9F263ED44D0D31FD33FD3FFF404D153608040F40E6FA131F2605173BAF2A207F901541087F910F2A302F404D1F8007F8E16218010F4786FA5209802D307D43001FB009132E201B3E65B8325A1C840348040F4438AE63101C8CB1F13CB3FCBFFF400C9ED54080004D03002012006070017BD9CE76A26869AF98EB85FFC0041BE5F976A268698F98E99FE9FF98FA0268A91040207A0737D098C92DBFC95DD1F140034208040F4966FA56C122094305303B9DE2093333601926C21E2B39F9E545A";

const V4R2_CODE: &str = concat!(
    "B5EE9C72410214010002D4000114FF00F4A413F4BCF2C80B010201200203020148040504F8F28308D71820D31FD31FD31F02",
    "F823BBF264ED44D0D31FD31FD3FFF404D15143BAF2A15151BAF2A205F901541064F910F2A3F80024A4C8CB1F5240CB1F5230",
    "CBFF5210F400C9ED54F80F01D30721C0009F6C519320D74A96D307D402FB00E830E021C001E30021C002E30001C0039130E3",
    "0D03A4C8CB1F12CB1FCBFF1011121302E6D001D0D3032171B0925F04E022D749C120925F04E002D31F218210706C7567BD22",
    "821064737472BDB0925F05E003FA403020FA4401C8CA07CBFFC9D0ED44D0810140D721F404305C810108F40A6FA131B3925F",
    "07E005D33FC8258210706C7567BA923830E30D03821064737472BA925F06E30D06070201200809007801FA00F40430F8276F",
    "2230500AA121BEF2E0508210706C7567831EB17080185004CB0526CF1658FA0219F400CB6917CB1F5260CB3F20C98040FB00",
    "06008A5004810108F45930ED44D0810140D720C801CF16F400C9ED540172B08E23821064737472831EB17080185005CB0550",
    "03CF1623FA0213CB6ACB1FCB3FC98040FB00925F03E20201200A0B0059BD242B6F6A2684080A06B90FA0218470D4080847A4",
    "937D29910CE6903E9FF9837812801B7810148987159F31840201580C0D0011B8C97ED44D0D70B1F8003DB29DFB5134204050",
    "35C87D010C00B23281F2FFF274006040423D029BE84C600201200E0F0019ADCE76A26840206B90EB85FFC00019AF1DF6A268",
    "40106B90EB858FC0006ED207FA00D4D422F90005C8CA0715CBFFC9D077748018C8CB05CB0222CF165005FA0214CB6B12CCCC",
    "C973FB00C84014810108F451F2A7020070810108D718FA00D33FC8542047810108F451F2A782106E6F746570748018C8CB05",
    "CB025006CF165004FA0214CB6A12CB1FCB3FC973FB0002006C810108D718FA00D33F305224810108F459F2A7821064737472",
    "70748018C8CB05CB025005CF165003FA0213CB6ACB1F12CB3FC973FB00000AF400C9ED54696225E5",
);
const HIGHLOAD_V3_CODE: &str = concat!(
    "B5EE9C7241021001000228000114FF00F4A413F4BCF2C80B01020120020D02014803040078D020D74BC00101C060B0915BE1",
    "01D0D3030171B0915BE0FA4030F828C705B39130E0D31F018210AE42E5A4BA9D8040D721D74CF82A01ED55FB04E030020120",
    "050A02027306070011ADCE76A2686B85FFC00201200809001AABB6ED44D0810122D721D70B3F0018AA3BED44D08307D721D7",
    "0B1F0201200B0C001BB9A6EED44D0810162D721D70B15800E5B8BF2EDA2EDFB21AB09028409B0ED44D0810120D721F404F40",
    "4D33FD315D1058E1BF82325A15210B99F326DF82305AA0015A112B992306DDE923033E2923033E25230800DF40F6FA19ED02",
    "1D721D70A00955F037FDB31E09130E259800DF40F6FA19CD001D721D70A00937FDB31E0915BE270801F6F2D48308D718D121",
    "F900ED44D0D3FFD31FF404F404D33FD315D1F82321A15220B98E12336DF82324AA00A112B9926D32DE58F82301DE541675F9",
    "10F2A106D0D31FD4D307D30CD309D33FD315D15168BAF2A2515ABAF2A6F8232AA15250BCF2A304F823BBF2A35304800DF40F",
    "6FA199D024D721D70A00F2649130E20E01FE5309800DF40F6FA18E13D05004D718D20001F264C858CF16CF8301CF168E1030",
    "C824CF40CF8384095005A1A514CF40E2F800C94039800DF41704C8CBFF13CB1FF40012F40012CB3F12CB15C9ED54F80F21D0",
    "D30001F265D3020171B0925F03E0FA4001D70B01C000F2A5FA4031FA0031F401FA0031FA00318060D721D300010F0020F265",
    "D2000193D431D19130E272B1FB00B585BF03",
);

fn bundled_boc(version: WalletVersion) -> Option<&'static str> {
    match version {
        WalletVersion::V1R1 => Some(V1R1_CODE),
        WalletVersion::V1R2 => Some(V1R2_CODE),
        WalletVersion::V1R3 => Some(V1R3_CODE),
        WalletVersion::V2R1 => Some(V2R1_CODE),
        WalletVersion::V2R2 => Some(V2R2_CODE),
        WalletVersion::V3R1 => Some(V3R1_CODE),
        WalletVersion::V3R2 => Some(V3R2_CODE),
        WalletVersion::V4R2 => Some(V4R2_CODE),
        WalletVersion::V5R1 => Some(V5R1_CODE),
        WalletVersion::HighloadV2 => Some(HIGHLOAD_V2_CODE),
        WalletVersion::HighloadV3 => Some(HIGHLOAD_V3_CODE),
        // TODO: bundle the highload v1 code once a verified BOC is pinned
        WalletVersion::HighloadV1 => None,
    }
}

/// A wallet contract's code cell together with its digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCode {
    digest: CellDigest,
    cell: ArcCell,
}

impl ContractCode {
    /// Code shipped with the crate for `version`
    pub fn bundled(version: WalletVersion) -> HawalaResult<Self> {
        match bundled_boc(version) {
            Some(hex_boc) => Ok(Self::from_cell(Cell::from_boc_hex(hex_boc)?)),
            None => Err(HawalaError::code_unavailable(format!(
                "No bundled code for {}; supply the contract code BOC",
                version
            ))),
        }
    }

    pub fn from_cell(cell: ArcCell) -> Self {
        Self {
            digest: cell.digest(),
            cell,
        }
    }

    pub fn from_boc(bytes: &[u8]) -> HawalaResult<Self> {
        Ok(Self::from_cell(Cell::from_boc(bytes)?))
    }

    pub fn from_boc_base64(encoded: &str) -> HawalaResult<Self> {
        Ok(Self::from_cell(Cell::from_boc_base64(encoded)?))
    }

    /// Caller-supplied code for `version`, checked against the bundled code when one exists
    pub fn for_version(version: WalletVersion, cell: ArcCell) -> HawalaResult<Self> {
        let supplied = Self::from_cell(cell);
        supplied.check_version(version)?;
        Ok(supplied)
    }

    /// Fail with `InvalidBoc` unless this is the code of `version`
    pub fn check_version(&self, version: WalletVersion) -> HawalaResult<()> {
        let Some(hex_boc) = bundled_boc(version) else {
            return Ok(());
        };
        let known = Cell::from_boc_hex(hex_boc)?.digest();
        if known != self.digest {
            return Err(HawalaError::new(
                ErrorCode::InvalidBoc,
                format!("Supplied code does not match the {} contract", version),
            )
            .with_details(format!(
                "expected {}, got {}",
                known.hash_hex(),
                self.digest.hash_hex()
            )));
        }
        Ok(())
    }

    pub fn digest(&self) -> CellDigest {
        self.digest
    }

    /// Full code cell, attached to the first message as part of `StateInit`
    pub fn cell(&self) -> &ArcCell {
        &self.cell
    }
}
