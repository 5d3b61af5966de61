use crate::error::Result;
use crate::keyring::Keyring;
use crate::meta::Meta;

pub fn handle_contact(keyring: &mut Keyring, address: &str, name: &str) -> Result<()> {
    keyring.save_address_meta(address, Meta::named(name))?;
    println!("Contact '{}' saved.", name);
    Ok(())
}

pub fn handle_recent(keyring: &mut Keyring, address: &str) -> Result<()> {
    let json = keyring.save_recent(address)?;
    if json.meta.is_recent() {
        println!("Recent address {}", json.address);
    } else {
        println!("{} is already a contact.", json.address);
    }
    Ok(())
}

pub fn handle_forget_address(keyring: &mut Keyring, address: &str) -> Result<()> {
    keyring.forget_address(address)?;
    println!("Address {} removed.", address);
    Ok(())
}
